use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "shopwatch-cli")]
#[command(about = "Query a running shopwatch through its admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "SHOPWATCH_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check watcher status
    Status,
    /// List jobs with their cadence, state and trigger counters
    Jobs,
    /// Recent run records, newest first
    Runs {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        /// Only runs with this status (ok, error)
        #[arg(short, long)]
        status: Option<String>,
        /// Only runs of this job
        #[arg(short, long)]
        job: Option<String>,
    },
    /// Current state per subject of one subject type
    Latest {
        /// payment, delayed_order, eol_product, abandoned_cart, pagespeed, service_health
        subject_type: String,
        /// Only rows from the newest cycle
        #[arg(long)]
        cycle: bool,
        #[arg(long)]
        exclude_ok: bool,
    },
    /// Open alerts for payments, delayed orders and EOL products
    Alerts {
        /// warning or critical
        #[arg(short, long, default_value = "warning")]
        min_status: String,
    },
    /// Bucketed series with percentiles
    Series {
        subject_type: String,
        /// Comma separated subject keys
        #[arg(short, long)]
        keys: Option<String>,
        #[arg(short, long, default_value = "24h")]
        window: String,
    },
    /// Dashboard summary
    Summary {
        #[arg(short, long, default_value = "24h")]
        window: String,
        /// Comma separated section names; all when omitted
        #[arg(short, long)]
        sections: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let (path, query): (String, Vec<(&str, String)>) = match &cli.command {
        Commands::Status => ("/admin/status".into(), vec![]),
        Commands::Jobs => ("/admin/jobs".into(), vec![]),
        Commands::Runs { limit, status, job } => {
            let mut query = vec![("limit", limit.to_string())];
            if let Some(status) = status {
                query.push(("status", status.clone()));
            }
            if let Some(job) = job {
                query.push(("job", job.clone()));
            }
            ("/admin/runs".into(), query)
        }
        Commands::Latest { subject_type, cycle, exclude_ok } => (
            format!("/admin/latest/{subject_type}"),
            vec![("cycle", cycle.to_string()), ("exclude_ok", exclude_ok.to_string())],
        ),
        Commands::Alerts { min_status } => ("/admin/alerts".into(), vec![("min_status", min_status.clone())]),
        Commands::Series { subject_type, keys, window } => {
            let mut query = vec![("subject_type", subject_type.clone()), ("window", window.clone())];
            if let Some(keys) = keys {
                query.push(("keys", keys.clone()));
            }
            ("/admin/series".into(), query)
        }
        Commands::Summary { window, sections } => {
            let mut query = vec![("window", window.clone())];
            if let Some(sections) = sections {
                query.push(("sections", sections.clone()));
            }
            ("/admin/summary".into(), query)
        }
    };

    let res = client
        .get(format!("{base}{path}"))
        .headers(headers)
        .query(&query)
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
