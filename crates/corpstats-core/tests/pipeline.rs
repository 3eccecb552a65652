//! End-to-end runs: derive, aggregate, write, compress, inspect.

use std::path::Path;

use corpstats_core::codec::read_text;
use corpstats_core::derive::{BASEFORM_FIRST, COMPLEMGRAM_BEST_COND, SENSE_BEST};
use corpstats_core::table::write_table_to;
use corpstats_core::{
    AggregateConfig, AnnotationSink, Codec, Column, DerivationInputs, MemorySource, WorkDir,
    aggregate, compress, derive_all, inspect, read_table, standard_derivations, write_table,
};
use indicatif::ProgressBar;
use tempfile::TempDir;

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn column_names(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Aggregate and render to bytes, the way an export would.
fn render(src: &MemorySource, files: &[String], min_count: u64, workers: usize) -> Vec<u8> {
    let columns = [Column::new("token", "word"), Column::new("POS", "msd")];
    let cfg = AggregateConfig {
        columns: &columns,
        token_annotation: "word",
        min_count,
        workers,
    };
    let (table, _) = aggregate(src, files, &cfg, &ProgressBar::hidden()).unwrap();
    let (_, out) = write_table_to(&table, &column_names(&columns), b'\t', Vec::new()).unwrap();
    out
}

fn small_corpus() -> (MemorySource, Vec<String>) {
    let src = MemorySource::new()
        .with("a", "word", ["hund", "katt", "hund", "och"])
        .with("a", "msd", ["NN", "NN", "NN", "KN"])
        .with("b", "word", ["och", "hund", "springer"])
        .with("b", "msd", ["KN", "NN", "VB"])
        .with("c", "word", ["katt", "och", "och", "hund"])
        .with("c", "msd", ["NN", "KN", "KN", "VB"])
        .with("d", "word", Vec::<String>::new())
        .with("d", "msd", Vec::<String>::new());
    let files = src.source_files();
    (src, files)
}

#[test]
fn single_column_scenario() {
    let src = MemorySource::new()
        .with("f1", "word", ["a", "b"])
        .with("f2", "word", ["a", "a"]);
    let columns = [Column::new("token", "word")];
    let cfg = AggregateConfig {
        columns: &columns,
        token_annotation: "word",
        min_count: 1,
        workers: 2,
    };
    let (table, _) = aggregate(&src, &src.source_files(), &cfg, &ProgressBar::hidden()).unwrap();
    let (_, out) = write_table_to(&table, &column_names(&columns), b',', Vec::new()).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "token,count\na,3\nb,1\n");
}

#[test]
fn output_independent_of_file_order_and_workers() {
    let (src, files) = small_corpus();
    let reference = render(&src, &files, 0, 1);

    let mut reversed = files.clone();
    reversed.reverse();
    let rotated: Vec<String> = files.iter().cycle().skip(2).take(files.len()).cloned().collect();

    for order in [&files, &reversed, &rotated] {
        for workers in [1, 2, 3, 8] {
            assert_eq!(render(&src, order, 0, workers), reference);
        }
    }
}

#[test]
fn raising_cutoff_only_removes_rows() {
    let (src, files) = small_corpus();
    let parse = |bytes: Vec<u8>| read_table(bytes.as_slice(), b'\t').unwrap().1;

    let mut previous = parse(render(&src, &files, 0, 2));
    for min_count in 1..=5 {
        let current = parse(render(&src, &files, min_count, 2));
        assert!(current.len() <= previous.len());
        for (key, n) in current.iter() {
            assert!(n >= min_count);
            assert_eq!(previous.get(key), Some(n));
        }
        previous = current;
    }
}

#[test]
fn written_table_round_trips() {
    let (src, files) = small_corpus();
    let bytes = render(&src, &files, 0, 4);
    let (names, table) = read_table(bytes.as_slice(), b'\t').unwrap();
    assert_eq!(names, strings(&["token", "POS"]));
    assert_eq!(table.total(), 11);
    assert_eq!(table.get(&["hund", "NN"].into_iter().collect()), Some(3));
    assert_eq!(table.get(&["och", "KN"].into_iter().collect()), Some(4));
}

fn seed_workdir(wd: &WorkDir, file: &str) {
    let put = |name: &str, values: &[&str]| {
        wd.write_annotation(file, name, &strings(values)).unwrap();
    };
    put("word", &["hunden", "springer", "hunden"]);
    put("msd", &["NN.UTR.SIN.DEF.NOM", "VB.PRS.AKT", "NN.UTR.SIN.DEF.NOM"]);
    put("baseform", &["|hund|", "|springa|", "|hund|"]);
    put("lemgram", &["|hund..nn.1|", "|springa..vb.1|", "|hund..nn.1|"]);
    put("sense", &["|hund..1:0.9|hund..2:0.1|", "|springa..1:0.6|", "|"]);
    put("complemgram", &["|", "|", "|hun+den:0.3|"]);
}

fn export(wd: &WorkDir, out: &Path) -> usize {
    let columns = [
        Column::new("token", "word"),
        Column::new("lemma", BASEFORM_FIRST),
        Column::new("SALDO sense", SENSE_BEST),
        Column::new("compound", COMPLEMGRAM_BEST_COND),
    ];
    let files = wd.source_files().unwrap();
    let cfg = AggregateConfig {
        columns: &columns,
        token_annotation: "word",
        min_count: 1,
        workers: 2,
    };
    let (table, stats) = aggregate(wd, &files, &cfg, &ProgressBar::hidden()).unwrap();
    assert_eq!(stats.files, files.len());
    write_table(&table, &column_names(&columns), b'\t', out).unwrap()
}

#[test]
fn workdir_export_compress_inspect() {
    for codec in [None, Some(Codec::Gzip), Some(Codec::Zstd)] {
        let dir = TempDir::new().unwrap();
        let wd = WorkDir::new(dir.path().join("work"), codec);
        seed_workdir(&wd, "doc1");
        seed_workdir(&wd, "doc2");

        let inputs = DerivationInputs {
            complemgram: "complemgram",
            sense: "sense",
            baseform: "baseform",
            lemgram: "lemgram",
        };
        let files = wd.source_files().unwrap();
        assert_eq!(files, strings(&["doc1", "doc2"]));
        derive_all(&wd, &files, &standard_derivations(&inputs), &ProgressBar::hidden()).unwrap();

        let csv = dir.path().join("export/frequency_list/stats_demo.csv");
        assert_eq!(export(&wd, &csv), 3);
        let text = read_text(&csv, None).unwrap();
        assert_eq!(
            text,
            "token\tlemma\tSALDO sense\tcompound\tcount\n\
             hunden\thund\t\thun+den\t2\n\
             hunden\thund\thund..1\t\t2\n\
             springer\tspringa\tspringa..1\t\t2\n"
        );

        let bz2 = dir.path().join("export/frequency_list/stats_demo.csv.bz2");
        compress(&csv, &bz2, "bz2").unwrap();
        assert!(csv.exists());
        assert_eq!(inspect(&bz2, None, || Some("bz2".into())).unwrap(), text);
        assert_eq!(inspect(&bz2, Some(Codec::Bzip2), || None).unwrap(), text);
    }
}
