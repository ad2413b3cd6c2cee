use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::Rng;

use comfy_relay::relay;
use comfy_relay::workflow::overrides::parse_set_pairs;
use comfy_relay::workflow::template::{self, DEFAULT_CKPT_NAME};
use comfy_relay::{ComfyUIClient, Config, Endpoint, Workflow};

#[derive(Parser, Debug)]
#[command(name = "comfyctl", about = "CLI for the ComfyUI workflow relay", version)]
struct Cli {
    /// Override COMFYUI_SERVER (host:port or URL)
    #[arg(global = true, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow file, wait for it and save the images
    Run {
        /// Path to a workflow JSON file (API format)
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Directory the images are written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
        /// Overrides as key=value (repeatable), e.g. `3.inputs.seed=42`
        #[arg(long = "set", value_name = "KEY=VALUE")]
        sets: Vec<String>,
    },
    /// Queue the built-in text-to-image workflow without waiting
    Queue {
        /// Positive prompt text
        #[arg(long, value_name = "TEXT")]
        text: String,
        /// Seed (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Checkpoint name
        #[arg(long, default_value = DEFAULT_CKPT_NAME)]
        ckpt_name: String,
        /// Print the workflow before sending
        #[arg(short, long)]
        verbose: bool,
    },
    /// List image outputs recorded for a job
    History {
        #[arg(long)]
        prompt_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();
    comfy_relay::init_tracing();

    let conf = Config::new();
    let server = cli.server.unwrap_or(conf.comfyui_server);
    let endpoint = Endpoint::parse(&server)?;
    let http = reqwest::Client::new();

    match cli.command {
        Commands::Run { file, out, sets } => {
            let data = tokio::fs::read_to_string(&file).await?;
            let mut workflow = Workflow::parse(&data)?;
            if !sets.is_empty() {
                workflow.apply_overrides(&parse_set_pairs(&sets)?)?;
            }

            let images = match relay::run_workflow(http, &endpoint, &workflow).await {
                Ok(images) => images,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };

            tokio::fs::create_dir_all(&out).await?;
            for (node_id, list) in images {
                for (i, bytes) in list.iter().enumerate() {
                    let path = out.join(format!("{}_image_{}.png", node_id, i));
                    tokio::fs::write(&path, bytes).await?;
                    println!("Saved {} ({} bytes)", path.display(), bytes.len());
                }
            }
            Ok(())
        }
        Commands::Queue { text, seed, ckpt_name, verbose } => {
            let seed = seed.unwrap_or_else(|| rand::thread_rng().gen_range(0..i64::MAX as u64));
            let workflow = template::text_to_image_with_checkpoint(&text, seed, &ckpt_name);
            if verbose {
                eprintln!("[verbose] Workflow:\n{}", serde_json::to_string_pretty(&workflow)?);
            }

            let client = ComfyUIClient::for_endpoint(http, &endpoint);
            let client_id = uuid::Uuid::new_v4().to_string();
            match client.queue_prompt(&workflow, &client_id).await {
                Ok(queued) => {
                    println!("{}", serde_json::to_string_pretty(&queued)?);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::History { prompt_id } => {
            let client = ComfyUIClient::for_endpoint(http, &endpoint);
            let entry = client.get_history(&prompt_id).await.map_err(|e| {
                eprintln!("Error: {}", e);
                e
            })?;
            let mut found = false;
            for (node_id, refs) in entry.images() {
                for image in refs {
                    found = true;
                    let path = if image.subfolder.is_empty() {
                        image.filename.clone()
                    } else {
                        format!("{}/{}", image.subfolder, image.filename)
                    };
                    println!("{}\t{}\t{}", node_id, image.folder_type, path);
                }
            }
            if !found {
                eprintln!("No images found for prompt_id={}", prompt_id);
            }
            Ok(())
        }
    }
}
