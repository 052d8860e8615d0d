//! graphseq CLI: graph-to-text corpus preparation.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use graphseq::compress::replace_rare_tokens;
use graphseq::config::PipelineConfig;
use graphseq::corpus::overlap::{apply_blacklist, find_overlapping_lines};
use graphseq::corpus::{ParallelPaths, preprocess_file, preprocess_graph};
use graphseq::deanonymize::postprocess_file;
use graphseq::record::encode_line;
use graphseq::replacements::{ReplacementMap, build_replacement_map};
use graphseq::tokenize::MosesTokenizer;
use graphseq::vocab::Vocabulary;

#[derive(Parser)]
#[command(name = "graphseq", version, about = "Graph-to-text corpus preparation")]
struct Cli {
    /// Pipeline configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Linearize and anonymize a serialized graph file into parallel files.
    Preprocess {
        /// File of serialized graphs with `# ::snt` comments.
        infile: PathBuf,

        /// Output prefix; writes <prefix>-src.txt, -tgt.txt, -anon.txt, -orig.txt.
        outfile_prefix: PathBuf,

        /// Write blank lines for graphs that fail to decode.
        #[arg(long)]
        with_blanks: bool,

        /// Process sentences in parallel.
        #[arg(long)]
        parallel: bool,
    },

    /// Read one serialized graph from stdin and print its linear form.
    Linearize,

    /// Count target tokens into a vocabulary file.
    Vocab {
        /// Target file to count (usually <prefix>-tgt.txt).
        #[arg(long)]
        infile: PathBuf,

        /// Where to write `token<TAB>frequency` lines.
        #[arg(long)]
        vocabfile: PathBuf,

        /// Maximum number of entries to write.
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Rename out-of-vocabulary placeholders to _UNK<n> in a split.
    ReplaceRare {
        /// Prefix of the parallel files to rewrite in place.
        #[arg(long)]
        prefix: PathBuf,

        /// Vocabulary built with `graphseq vocab`.
        #[arg(long)]
        vocabfile: PathBuf,

        /// Tokens seen fewer times than this are replaced.
        #[arg(long)]
        min_freq: Option<u64>,
    },

    /// Build the literal → surface form map from record files.
    BuildMap {
        /// One or more -anon.txt files.
        #[arg(long, num_args = 1.., required = true)]
        infiles: Vec<PathBuf>,

        /// Output JSON file.
        #[arg(long)]
        outfile: PathBuf,
    },

    /// De-anonymize and detokenize model predictions.
    Postprocess {
        /// Model predictions, one line per sentence.
        #[arg(long)]
        infile: PathBuf,

        /// Where to write the restored sentences.
        #[arg(long)]
        outfile: PathBuf,

        /// The -anon.txt file aligned with the predictions.
        #[arg(long)]
        replacements: PathBuf,

        /// Map built with `graphseq build-map`.
        #[arg(long)]
        replacements_map: PathBuf,
    },

    /// Remove training lines that also appear in test data.
    RemoveOverlap {
        /// Training target files (<prefix>-tgt.txt).
        #[arg(long, num_args = 1.., required = true)]
        train_files: Vec<PathBuf>,

        /// Test target files.
        #[arg(long, num_args = 1.., required = true)]
        test_files: Vec<PathBuf>,

        /// Where overlapping lines are collected.
        #[arg(long)]
        blacklist_file: PathBuf,

        /// Blank removed lines instead of dropping them.
        #[arg(long)]
        with_blanks: bool,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    let tokenizer = MosesTokenizer::new();

    match cli.command {
        Commands::Preprocess {
            infile,
            outfile_prefix,
            with_blanks,
            parallel,
        } => {
            config.preprocess.output_blank_for_failure |= with_blanks;
            config.preprocess.parallel |= parallel;
            let stats = preprocess_file(&infile, &outfile_prefix, &tokenizer, &config.preprocess)?;
            println!(
                "Linearized {} graphs. Skipped {} ({:.4}).",
                stats.written,
                stats.skipped,
                stats.failure_ratio()
            );
        }

        Commands::Linearize => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input).into_diagnostic()?;
            let out = preprocess_graph(&input)?;
            println!("{}", out.linear);
            println!("{}", encode_line(&out.records).into_diagnostic()?);
        }

        Commands::Vocab {
            infile,
            vocabfile,
            max_tokens,
        } => {
            let vocab = Vocabulary::build_from_file(&infile)?;
            vocab.save(&vocabfile, max_tokens.unwrap_or(config.vocab.max_tokens))?;
            println!(
                "{} vocab words written to {}",
                vocab.len(),
                vocabfile.display()
            );
        }

        Commands::ReplaceRare {
            prefix,
            vocabfile,
            min_freq,
        } => {
            let min_freq = min_freq.unwrap_or(config.vocab.min_freq);
            let vocab = Vocabulary::load(&vocabfile, min_freq)?;
            let paths = ParallelPaths::from_prefix(&prefix);
            let stats = replace_rare_tokens(
                &paths,
                &vocab,
                &config.compress,
                config.preprocess.progress_interval,
            )?;
            println!(
                "Replaced {} rare placeholder tokens in {} lines",
                stats.replaced, stats.lines
            );
        }

        Commands::BuildMap { infiles, outfile } => {
            let map = build_replacement_map(&infiles, &config.compress.replacement)?;
            map.save(&outfile)?;
            println!("{} replacements written to {}", map.len(), outfile.display());
        }

        Commands::Postprocess {
            infile,
            outfile,
            replacements,
            replacements_map,
        } => {
            let map = ReplacementMap::load(&replacements_map)?;
            let n = postprocess_file(&infile, &replacements, &map, &tokenizer, &outfile)?;
            println!("Wrote {n} lines to {}", outfile.display());
        }

        Commands::RemoveOverlap {
            train_files,
            test_files,
            blacklist_file,
            with_blanks,
        } => {
            let splits: Vec<ParallelPaths> = train_files
                .iter()
                .map(|f| ParallelPaths::from_member(f))
                .collect();
            for split in &splits {
                split.require_existing()?;
            }

            let mut append = false;
            for train in &train_files {
                for test in &test_files {
                    find_overlapping_lines(
                        test,
                        train,
                        &blacklist_file,
                        append,
                        config.preprocess.progress_interval,
                    )?;
                    append = true;
                }
            }

            for split in &splits {
                let removed = apply_blacklist(split, &blacklist_file, with_blanks)?;
                println!("Removed {removed} lines from {}", split.target.display());
            }
        }
    }

    Ok(())
}
