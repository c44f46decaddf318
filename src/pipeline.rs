use std::fs::File;
use std::path::PathBuf;

use smol::channel::{Receiver, Sender};
use smol::io::{AsyncBufReadExt, BufReader};
use smol::stream::StreamExt;
use smol::{LocalExecutor, Unblock};

use crate::fetch;
use crate::filter::ListFilter;
use crate::freq::FreqTable;
use crate::tokenize::{self, Dictionary};
use crate::Config;

/// One input source. Files are opened by the caller before the pipeline
/// starts, so an unreadable path aborts the run before anything is counted.
pub enum Input {
    File { path: PathBuf, file: File },
    Url(String),
    Stdin,
}

/// Fans every source into one unbounded channel and drains it from a single
/// consumer. A watcher task awaits every producer and then closes the
/// channel, which is the only completion signal the consumer sees.
pub fn run(
    inputs: Vec<Input>,
    config: &Config,
    filter: &ListFilter,
    dict: Option<&Dictionary>,
    table: &FreqTable,
) {
    let local_ex = LocalExecutor::new();
    futures_lite::future::block_on(local_ex.run(async {
        let (tx, rx) = smol::channel::unbounded::<String>();
        let mut producers = Vec::new();
        for input in inputs {
            producers.push(local_ex.spawn(produce(input, tx.clone())));
        }
        let closer = local_ex.spawn(async move {
            for producer in producers {
                producer.await;
            }
            tx.close();
        });
        consume(&rx, config, filter, dict, table).await;
        closer.await;
    }));
}

async fn produce(input: Input, items: Sender<String>) {
    match input {
        Input::File { path, file } => {
            let mut lines = BufReader::new(Unblock::new(file)).lines();
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        if items.send(line).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!("read error in {}: {}", path.display(), err);
                        return;
                    }
                }
            }
        }
        Input::Stdin => {
            let mut lines = BufReader::new(async_std::io::stdin()).lines();
            while let Some(line) = lines.next().await {
                match line {
                    Ok(line) => {
                        if items.send(line).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!("read error on stdin: {}", err);
                        return;
                    }
                }
            }
        }
        Input::Url(url) => match fetch::fetch_items(&url).await {
            Ok(found) => {
                for item in found {
                    if items.send(item).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => log::warn!("skipping {}: {}", url, err),
        },
    }
}

/// Drains the channel until it closes. Each item passes the filter, then the
/// base form and any enabled expansions are counted.
pub async fn consume(
    items: &Receiver<String>,
    config: &Config,
    filter: &ListFilter,
    dict: Option<&Dictionary>,
    table: &FreqTable,
) {
    while let Ok(item) = items.recv().await {
        if !filter.accepts(&item) {
            continue;
        }
        if config.parse_variants {
            for form in tokenize::variant_forms(&item) {
                table.increment(&form);
            }
        } else {
            table.increment(&item);
        }
        if config.ngrams {
            for token in tokenize::ngram_tokens(&item, config.exclude) {
                table.increment(token);
            }
        }
        if let Some(dict) = dict {
            for segment in dict.segment(&item) {
                table.increment(segment);
            }
        }
    }
}

#[cfg(test)]
fn plain_config() -> Config {
    Config {
        show_count: false,
        parse_variants: false,
        ngrams: false,
        minimum: 0,
        exclude: 0,
        dictionary_only: false,
    }
}

#[cfg(test)]
fn empty_filter(exclude: usize) -> ListFilter {
    ListFilter::new(exclude, Default::default(), Default::default())
}

#[cfg(test)]
fn consume_lines(lines: &[&str], config: &Config, dict: Option<&Dictionary>) -> FreqTable {
    let table = FreqTable::new();
    let filter = empty_filter(config.exclude);
    futures_lite::future::block_on(async {
        let (tx, rx) = smol::channel::unbounded();
        for line in lines {
            tx.send(line.to_string()).await.unwrap();
        }
        tx.close();
        consume(&rx, config, &filter, dict, &table).await;
    });
    table
}

#[test]
fn every_line_is_counted_once_without_expansions() {
    let table = consume_lines(&["alpha", "beta", "alpha"], &plain_config(), None);
    assert_eq!(table.count("alpha"), 2);
    assert_eq!(table.count("beta"), 1);
    assert_eq!(table.len(), 2);
}

#[test]
fn ngram_mode_counts_tokens_in_addition_to_the_line() {
    let line = "the quick brown fox jumps over the lazy dog";
    let config = Config {
        ngrams: true,
        ..plain_config()
    };
    let table = consume_lines(&[line, line], &config, None);
    assert_eq!(table.count("the"), 4);
    assert_eq!(table.count("quick"), 2);
    assert_eq!(table.count("lazy"), 2);
    assert_eq!(table.count(line), 2);
}

#[test]
fn variant_mode_counts_all_four_forms() {
    let config = Config {
        parse_variants: true,
        ..plain_config()
    };
    let table = consume_lines(&["pass word"], &config, None);
    assert_eq!(table.count("pass word"), 1);
    assert_eq!(table.count("Pass Word"), 1);
    assert_eq!(table.count("PassWord"), 1);
    assert_eq!(table.count("password"), 1);
}

#[test]
fn segmentation_counts_matched_words_alongside_the_line() {
    let dict = Dictionary::from_words(vec!["quick".into(), "lazy".into(), "fox".into()]);
    let line = "thequickbrownfoxjumpsoverthelazydog";
    let table = consume_lines(&[line], &plain_config(), Some(&dict));
    assert_eq!(table.count(line), 1);
    assert_eq!(table.count("quick"), 1);
    assert_eq!(table.count("fox"), 0);
}

#[test]
fn segmentation_is_idempotent_across_runs() {
    let dict = Dictionary::from_words(vec!["quick".into(), "lazy".into(), "fox".into()]);
    let line = "thequickbrownfoxjumpsoverthelazydog";
    let first = consume_lines(&[line], &plain_config(), Some(&dict));
    let second = consume_lines(&[line], &plain_config(), Some(&dict));
    assert_eq!(first.ranked(), second.ranked());
}

#[test]
fn run_ingests_file_lines_through_the_fan_in() {
    let path = std::env::temp_dir().join("frqmode_pipeline_test.txt");
    std::fs::write(&path, "alpha\nbeta\nalpha\n").unwrap();
    let file = File::open(&path).unwrap();
    let table = FreqTable::new();
    run(
        vec![Input::File {
            path: path.clone(),
            file,
        }],
        &plain_config(),
        &empty_filter(0),
        None,
        &table,
    );
    std::fs::remove_file(&path).ok();
    assert_eq!(table.count("alpha"), 2);
    assert_eq!(table.count("beta"), 1);
}
