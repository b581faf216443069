//! Analysis and credit commands, issued through the cache-aware API client.

use clap::{Args, Subcommand};
use uuid::Uuid;
use virality_client::{AnalysisClient, HttpAnalysisStore};
use virality_core::{
    AnalysisPatch, AnalysisStatus, AnalysisWithInsights, ContentType, CreateAnalysisRequest,
    TargetAudience,
};

/// Connection settings for the analysis API.
#[derive(Debug, Args)]
pub(crate) struct ApiArgs {
    /// Base URL of the virality server
    #[arg(long, env = "VIRALITY_API_URL", default_value = "http://localhost:3000")]
    pub api_url: String,
    /// Session access token (the `sb-access-token` cookie value)
    #[arg(long, env = "VIRALITY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Subcommand)]
pub(crate) enum AnalysesCommands {
    /// List your analyses, newest first
    List,
    /// Show one analysis with its platform insights
    Show { id: Uuid },
    /// Submit content for analysis (spends one credit)
    Create {
        #[arg(long)]
        content: String,
        #[arg(long, value_parser = parse_content_type, default_value = "text")]
        content_type: ContentType,
        /// Target platforms, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        platforms: Vec<String>,
        #[arg(long)]
        age_range: String,
        #[arg(long, value_delimiter = ',')]
        interests: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        demographics: Vec<String>,
    },
    /// Move an analysis to its next status
    Update {
        id: Uuid,
        #[arg(long, value_parser = parse_status)]
        status: Option<AnalysisStatus>,
        /// Overall virality score (0-100), required when completing
        #[arg(long)]
        score: Option<f64>,
    },
}

fn parse_content_type(raw: &str) -> Result<ContentType, String> {
    raw.parse().map_err(|e: virality_core::CoreError| e.to_string())
}

fn parse_status(raw: &str) -> Result<AnalysisStatus, String> {
    raw.parse().map_err(|e: virality_core::CoreError| e.to_string())
}

fn client(api: &ApiArgs) -> anyhow::Result<AnalysisClient<HttpAnalysisStore>> {
    let store = HttpAnalysisStore::new(&api.api_url, &api.access_token, api.timeout_secs)?;
    Ok(AnalysisClient::new(store))
}

fn print_row(item: &AnalysisWithInsights) {
    let a = &item.analysis;
    let score = a
        .overall_virality_score
        .map_or_else(|| "-".to_string(), |s| format!("{s:.1}"));
    println!(
        "{}  {:<10}  {:>5}  {:<24}  {}",
        a.id,
        a.status.as_str(),
        score,
        a.platforms.join(","),
        a.title
    );
}

pub(crate) async fn run(api: &ApiArgs, command: AnalysesCommands) -> anyhow::Result<()> {
    let client = client(api)?;
    match command {
        AnalysesCommands::List => {
            let analyses = client.analyses().await?;
            if analyses.is_empty() {
                println!("no analyses yet");
            }
            for item in &analyses {
                print_row(item);
            }
        }
        AnalysesCommands::Show { id } => {
            let item = client.analysis(id).await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        AnalysesCommands::Create {
            content,
            content_type,
            platforms,
            age_range,
            interests,
            demographics,
        } => {
            let request = CreateAnalysisRequest {
                content,
                content_type,
                platforms,
                target_audience: TargetAudience {
                    age_range,
                    interests,
                    demographics,
                },
            };
            let created = client.create_analysis(&request).await?;
            println!("created analysis {} ({})", created.id, created.status);
        }
        AnalysesCommands::Update { id, status, score } => {
            let patch = AnalysisPatch {
                status,
                overall_virality_score: score,
            };
            let updated = client.update_analysis(id, &patch).await?;
            println!("analysis {} is now {}", updated.id, updated.status);
        }
    }
    Ok(())
}

pub(crate) async fn run_credits(api: &ApiArgs) -> anyhow::Result<()> {
    let credits = client(api)?.credits().await?;
    println!(
        "{} credit(s) remaining ({} tier)",
        credits.credits_remaining, credits.subscription_tier
    );
    Ok(())
}
