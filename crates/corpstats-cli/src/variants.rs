//! Export variants and the jobs built from them
//!
//! Every variant is one row in [`VARIANTS`]; a single builder turns a row
//! plus the configuration into an [`ExportJob`]. Compressed variants share
//! columns and directory with their base variant and read its table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use corpstats_core::derive::{
    BASEFORM_FIRST, COMPLEMGRAM_BEST_COND, DATE, LEMGRAM_FIRST, SENSE_BEST,
};
use corpstats_core::{Codec, Column, parse_delimiter};

use crate::config::Config;

/// Where a column's values come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Word,
    Msd,
    Pos,
    Baseform,
    Lemgram,
    HistSense,
    /// First baseform for Swedish corpora, the raw baseform otherwise.
    Lemma,
    /// Text date projected onto tokens by `corpstats annotate`.
    Date,
    /// A derived annotation written by `corpstats annotate`.
    Derived(&'static str),
}

impl Source {
    fn annotation(self, config: &Config) -> Result<String> {
        let names = &config.annotations;
        Ok(match self {
            Self::Word => names.word.clone(),
            Self::Msd => names.msd.clone(),
            Self::Pos => names.pos.clone(),
            Self::Baseform => names.baseform.clone(),
            Self::Lemgram => names.lemgram.clone(),
            Self::HistSense => names.hist_sense.clone(),
            Self::Lemma if config.corpus.is_swedish() => BASEFORM_FIRST.to_string(),
            Self::Lemma => names.baseform.clone(),
            Self::Date => {
                if names.date.trim().is_empty() {
                    anyhow::bail!("annotations.date must name the corpus' date annotation");
                }
                DATE.to_string()
            }
            Self::Derived(name) => name.to_string(),
        })
    }
}

pub type ColumnSpec = (&'static str, Source);

const FULL: &[ColumnSpec] = &[
    ("token", Source::Word),
    ("POS", Source::Msd),
    ("lemma", Source::Derived(BASEFORM_FIRST)),
    ("SALDO sense", Source::Derived(SENSE_BEST)),
    ("lemgram", Source::Derived(LEMGRAM_FIRST)),
    ("compound", Source::Derived(COMPLEMGRAM_BEST_COND)),
];

const WITH_DATE: &[ColumnSpec] = &[
    ("token", Source::Word),
    ("POS", Source::Msd),
    ("lemma", Source::Derived(BASEFORM_FIRST)),
    ("SALDO sense", Source::Derived(SENSE_BEST)),
    ("lemgram", Source::Derived(LEMGRAM_FIRST)),
    ("compound", Source::Derived(COMPLEMGRAM_BEST_COND)),
    ("date", Source::Date),
];

const SIMPLE: &[ColumnSpec] = &[
    ("token", Source::Word),
    ("POS", Source::Pos),
    ("lemma", Source::Lemma),
];

const OLD_SWEDISH: &[ColumnSpec] = &[
    ("token", Source::Word),
    ("lemma", Source::Baseform),
    ("lemgram", Source::Lemgram),
];

const HISTORICAL: &[ColumnSpec] = &[
    ("token", Source::Word),
    ("POS", Source::Msd),
    ("lemma", Source::Derived(BASEFORM_FIRST)),
    ("SALDO sense", Source::HistSense),
    ("lemgram", Source::Derived(LEMGRAM_FIRST)),
    ("compound", Source::Derived(COMPLEMGRAM_BEST_COND)),
];

#[derive(Debug)]
pub struct Variant {
    pub name: &'static str,
    pub description: &'static str,
    pub dir_suffix: &'static str,
    pub columns: &'static [ColumnSpec],
    pub compressed: bool,
}

impl Variant {
    /// The uncompressed variant a compressed one reads from; `None` for
    /// uncompressed variants.
    pub fn base(&self) -> Option<&'static Variant> {
        if !self.compressed {
            return None;
        }
        self.name.strip_suffix("_compressed").and_then(find)
    }
}

pub static VARIANTS: &[Variant] = &[
    Variant {
        name: "freq_list",
        description: "Word frequency list",
        dir_suffix: "",
        columns: FULL,
        compressed: false,
    },
    Variant {
        name: "freq_list_compressed",
        description: "Word frequency list (compressed)",
        dir_suffix: "",
        columns: FULL,
        compressed: true,
    },
    Variant {
        name: "freq_list_date",
        description: "Word frequency list with dates",
        dir_suffix: "_date",
        columns: WITH_DATE,
        compressed: false,
    },
    Variant {
        name: "freq_list_date_compressed",
        description: "Word frequency list with dates (compressed)",
        dir_suffix: "_date",
        columns: WITH_DATE,
        compressed: true,
    },
    Variant {
        name: "freq_list_simple",
        description: "Word frequency list without Swedish-specific annotations",
        dir_suffix: "_simple",
        columns: SIMPLE,
        compressed: false,
    },
    Variant {
        name: "freq_list_simple_compressed",
        description: "Word frequency list without Swedish-specific annotations (compressed)",
        dir_suffix: "_simple",
        columns: SIMPLE,
        compressed: true,
    },
    Variant {
        name: "freq_list_fsv",
        description: "Word frequency list for Old Swedish",
        dir_suffix: "_fsv",
        columns: OLD_SWEDISH,
        compressed: false,
    },
    Variant {
        name: "freq_list_fsv_compressed",
        description: "Word frequency list for Old Swedish (compressed)",
        dir_suffix: "_fsv",
        columns: OLD_SWEDISH,
        compressed: true,
    },
    Variant {
        name: "freq_list_1800",
        description: "Word frequency list for Swedish from the 1800s",
        dir_suffix: "_1800",
        columns: HISTORICAL,
        compressed: false,
    },
    Variant {
        name: "freq_list_1800_compressed",
        description: "Word frequency list for Swedish from the 1800s (compressed)",
        dir_suffix: "_1800",
        columns: HISTORICAL,
        compressed: true,
    },
];

pub fn find(name: &str) -> Option<&'static Variant> {
    VARIANTS.iter().find(|v| v.name == name)
}

/// Look up a variant by name, listing the valid names on failure.
pub fn lookup(name: &str) -> Result<&'static Variant> {
    find(name).with_context(|| {
        let names: Vec<&str> = VARIANTS.iter().map(|v| v.name).collect();
        format!("unknown variant '{name}' (expected one of: {})", names.join(", "))
    })
}

/// Everything needed to produce one variant's artifact.
#[derive(Debug)]
pub struct ExportJob {
    pub variant: &'static Variant,
    pub columns: Vec<Column>,
    pub token_annotation: String,
    /// Uncompressed table (the base variant's table for compressed variants).
    pub table_path: PathBuf,
    /// The artifact this variant produces.
    pub output_path: PathBuf,
    pub codec: Option<Codec>,
    pub delimiter: u8,
    pub min_count: u64,
    pub workers: usize,
}

impl ExportJob {
    pub fn build(variant: &'static Variant, config: &Config) -> Result<Self> {
        let corpus_id = config.corpus_id()?;
        let delimiter = parse_delimiter(&config.export.delimiter)?;
        let codec = if variant.compressed {
            Some(Codec::from_id(&config.export.compression)?)
        } else {
            None
        };

        let columns = variant
            .columns
            .iter()
            .map(|(name, source)| {
                let annotation = source
                    .annotation(config)
                    .with_context(|| format!("column '{name}' of {}", variant.name))?;
                Ok(Column::new(*name, annotation))
            })
            .collect::<Result<Vec<_>>>()?;

        let table_path = config
            .export
            .dir
            .join(format!("frequency_list{}", variant.dir_suffix))
            .join(format!("stats_{corpus_id}.csv"));
        let output_path = match codec {
            Some(codec) => {
                let name = format!("stats_{corpus_id}.csv");
                table_path.with_file_name(codec.apply_to_name(&name))
            }
            None => table_path.clone(),
        };

        Ok(Self {
            variant,
            columns,
            token_annotation: config.annotations.token.clone(),
            table_path,
            output_path,
            codec,
            delimiter,
            min_count: config.export.cutoff,
            workers: config.export.workers.max(1),
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
