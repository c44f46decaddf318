mod fetch;
mod filter;
mod freq;
mod pipeline;
mod tokenize;

use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((http|https)://)([\w-]+\.)+[\w-]+(/[\w\- ;,./?%&=]*)?$").unwrap()
});

/// Builds a frequency-ranked wordlist from files, URLs and standard input.
#[derive(Parser)]
#[command(name = "frqmode", version)]
struct Args {
    /// Files or URLs to ingest; standard input is also read when piped
    inputs: Vec<String>,

    /// Show the frequency count of each item
    #[arg(short, long)]
    count: bool,

    /// Expand each item into capitalized/stripped/lowercased variants
    #[arg(short = 'a', long)]
    parse: bool,

    /// Also count the whitespace-split tokens of each item
    #[arg(short, long)]
    ngrams: bool,

    /// Minimum frequency to include in output
    #[arg(short, long, default_value_t = 0)]
    minimum: usize,

    /// Drop items with byte length at or below this value
    #[arg(short = 'x', long, default_value_t = 0)]
    exclude: usize,

    /// Only include items found in this file (repeatable)
    #[arg(short = 'w', long = "retain-file")]
    retain_file: Vec<PathBuf>,

    /// Only include items not found in this file (repeatable)
    #[arg(short = 'v', long = "remove-file")]
    remove_file: Vec<PathBuf>,

    /// Segment each item against the words in this file
    #[arg(short = 'd', long = "dictionary-file")]
    dictionary_file: Option<PathBuf>,

    /// Restrict final output to dictionary words
    #[arg(long, requires = "dictionary_file")]
    dictionary_only: bool,
}

/// Every recognized option, resolved once and handed to the stages.
pub struct Config {
    pub show_count: bool,
    pub parse_variants: bool,
    pub ngrams: bool,
    pub minimum: usize,
    pub exclude: usize,
    pub dictionary_only: bool,
}

fn main() {
    env_logger::init();
    if let Err(err) = run(Args::parse()) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), BoxError> {
    let config = Config {
        show_count: args.count,
        parse_variants: args.parse,
        ngrams: args.ngrams,
        minimum: args.minimum,
        exclude: args.exclude,
        dictionary_only: args.dictionary_only,
    };

    let retain = filter::load_word_set(&args.retain_file)?;
    let remove = filter::load_word_set(&args.remove_file)?;
    let list_filter = filter::ListFilter::new(config.exclude, retain, remove);
    let dict = match &args.dictionary_file {
        Some(path) => Some(tokenize::Dictionary::load(path, config.exclude)?),
        None => None,
    };

    let mut inputs = Vec::new();
    for arg in &args.inputs {
        if URL_PATTERN.is_match(arg) {
            inputs.push(pipeline::Input::Url(arg.clone()));
        } else {
            let file =
                File::open(arg).map_err(|err| format!("cannot open {}: {}", arg, err))?;
            inputs.push(pipeline::Input::File {
                path: PathBuf::from(arg),
                file,
            });
        }
    }
    if !std::io::stdin().is_terminal() {
        inputs.push(pipeline::Input::Stdin);
    }

    let table = freq::FreqTable::new();
    pipeline::run(inputs, &config, &list_filter, dict.as_ref(), &table);

    if config.dictionary_only {
        if let Some(dict) = &dict {
            table.retain_dictionary(dict);
        }
    }

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    table.write_ranked(&mut out, config.show_count, config.minimum)?;
    out.flush()?;
    Ok(())
}

#[test]
fn url_pattern_separates_urls_from_paths() {
    assert!(URL_PATTERN.is_match("https://example.com/words.txt"));
    assert!(URL_PATTERN.is_match("http://sub.example-site.org"));
    assert!(!URL_PATTERN.is_match("ftp://example.com/words.txt"));
    assert!(!URL_PATTERN.is_match("./local/words.txt"));
    assert!(!URL_PATTERN.is_match("words.txt"));
}
