use scheme_extract::batch;
use scheme_extract::cleaner::CleaningPipeline;
use scheme_extract::config::Config;
use scheme_extract::document::DocumentInput;
use scheme_extract::output::{OutputFolder, local_now};
use scheme_extract::processor::SchemeProcessor;
use scheme_extract::scheme_db::SchemeStore;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = ".config/scheme_extract.toml";
const USAGE: &str = "usage: scheme_extract <clean|classify|context|process> <document|dir> [config.toml]
  clean      print the cleaned email text
  classify   print the keyword classification
  context    write the extractor input to the output folder, no LLM call
  process    full run; a directory processes every document in it";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, path) = match (args.first(), args.get(1)) {
        (Some(c), Some(p)) => (c.as_str(), p.as_str()),
        _ => return Err(USAGE.into()),
    };
    let config_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
    let cfg = Config::load_or_default(config_path)?;

    let path = Path::new(path);

    match command {
        "clean" => {
            let doc = DocumentInput::load(path)?;
            let mut pipeline = CleaningPipeline::from_config(&cfg)?;
            let cleaned = pipeline.clean(&doc.email_text);
            let stats = pipeline.cleaning_stats(&doc.email_text, &cleaned);
            let audit = pipeline.audit_summary();
            println!("{cleaned}");
            info!(
                paragraphs = audit.paragraphs,
                removed = audit.removed,
                retained = audit.retained,
                protected = audit.protected,
                fragments_removed = audit.fragments_removed,
                original = stats.original_length,
                cleaned = stats.cleaned_length,
                reduction_percent = stats.reduction_percent,
                "Cleaning statistics"
            );
        }
        "classify" => {
            let doc = DocumentInput::load(path)?;
            let processor = SchemeProcessor::from_config(&cfg)?;
            let cleaned = processor.cleaner().run(&doc.email_text).cleaned_text;
            let result = processor.classify_keywords(
                &cleaned,
                doc.table_text.as_deref(),
                doc.sheet_text.as_deref(),
            );
            println!("{}", result.classification);
            println!("{}", result.reasoning);
        }
        "context" => {
            let doc = DocumentInput::load(path)?;
            let processor = SchemeProcessor::from_config(&cfg)?;
            let input = processor.context(&doc);
            let folder = OutputFolder::create(&cfg.output_dir, &doc.stem())?;
            folder.write_context(&input)?;
            println!("{}", folder.path().display());
        }
        "process" => {
            let processor = SchemeProcessor::connect(&cfg).await?;
            let db = SchemeStore::new(&cfg.db_path)?;
            let output_dir = Path::new(&cfg.output_dir);

            if path.is_dir() {
                let (summary, summary_path) =
                    batch::process_dir(&processor, &db, path, output_dir, local_now()).await?;
                println!("{}", summary_path.display());
                if summary.failed > 0 {
                    warn!(failed = summary.failed, "Some documents failed, see summary");
                }
            } else {
                let done =
                    batch::process_document(&processor, &db, path, output_dir, local_now()).await?;
                println!("{}", serde_json::to_string_pretty(&done.outcome.config.to_json())?);
                info!(
                    uid = %done.uid,
                    classification = %done.outcome.classification,
                    output = %done.folder.path().display(),
                    "Document processed"
                );
            }

            let (total, processed, results) = db.get_counts()?;
            info!(
                documents_total = total,
                documents_processed = processed,
                results_total = results,
                "Database statistics"
            );
        }
        other => return Err(format!("unknown command `{other}`\n{USAGE}").into()),
    }

    Ok(())
}
