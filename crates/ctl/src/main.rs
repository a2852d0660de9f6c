use anyhow::Context;
use clap::{Parser, Subcommand};
use pulse_core::api::{
    AdminResponse, DecayRequest, EventRequest, GenerateActorsRequest, PublishRequest, QueueRequest,
};
use serde::Serialize;
use serde_json::Value;

const SECRET_HEADER: &str = "x-pulse-admin-secret";

#[derive(Parser, Debug)]
#[command(name = "pulsectl", about = "Admin client for the pulse daemon")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8090")]
    daemon: String,

    #[arg(long, env = "PULSE_ADMIN_SECRET", default_value = "")]
    secret: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create synthetic actors.
    Generate {
        #[arg(long)]
        count: usize,
    },
    Actor {
        id: String,
    },
    Health,
    Sweep,
    ForceActivity {
        id: String,
    },
    Distribute,
    ResetIdentities,
    /// Execute due tasks now.
    Tick,
    Queue,
    Resubmit {
        task_id: String,
    },
    References,
    Enqueue {
        content_id: String,
        #[arg(long, default_value_t = false)]
        force_today: bool,
    },
    Preview {
        #[arg(long)]
        limit: Option<usize>,
    },
    Publish {
        #[arg(long)]
        limit: Option<usize>,
    },
    Decay {
        #[arg(long)]
        step: Option<u32>,
    },
    Leaderboard {
        #[arg(long)]
        limit: Option<usize>,
    },
    Stages {
        content_id: String,
    },
    /// Send a domain event read from a JSON file.
    PublishEvent {
        #[arg(long)]
        file: String,
    },
}

struct Client {
    http: reqwest::Client,
    base: String,
    secret: String,
}

impl Client {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str) -> anyhow::Result<AdminResponse<Value>> {
        let resp = self
            .http
            .get(self.url(path))
            .header(SECRET_HEADER, &self.secret)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<AdminResponse<Value>> {
        let resp = self
            .http
            .post(self.url(path))
            .header(SECRET_HEADER, &self.secret)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }
}

fn limit_query(limit: Option<usize>) -> String {
    limit.map(|l| format!("?limit={l}")).unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client {
        http: reqwest::Client::new(),
        base: args.daemon,
        secret: args.secret,
    };
    let empty = serde_json::json!({});

    let resp = match args.cmd {
        Cmd::Generate { count } => {
            client
                .post("/v1/admin/actors/generate", &GenerateActorsRequest { count })
                .await?
        }
        Cmd::Actor { id } => client.get(&format!("/v1/admin/actors/{id}")).await?,
        Cmd::Health => client.get("/v1/admin/health").await?,
        Cmd::Sweep => client.post("/v1/admin/health/sweep", &empty).await?,
        Cmd::ForceActivity { id } => {
            client
                .post(&format!("/v1/admin/actors/{id}/force-activity"), &empty)
                .await?
        }
        Cmd::Distribute => {
            client
                .post("/v1/admin/identities/distribute", &empty)
                .await?
        }
        Cmd::ResetIdentities => client.post("/v1/admin/identities/reset", &empty).await?,
        Cmd::Tick => client.post("/v1/admin/tasks/tick", &empty).await?,
        Cmd::Queue => client.get("/v1/admin/tasks/counts").await?,
        Cmd::Resubmit { task_id } => {
            client
                .post(&format!("/v1/admin/tasks/{task_id}/resubmit"), &empty)
                .await?
        }
        Cmd::References => {
            client
                .post("/v1/admin/references/distribute", &empty)
                .await?
        }
        Cmd::Enqueue {
            content_id,
            force_today,
        } => {
            client
                .post(
                    "/v1/admin/popular/queue",
                    &QueueRequest {
                        content_id,
                        force_today,
                    },
                )
                .await?
        }
        Cmd::Preview { limit } => {
            client
                .get(&format!("/v1/admin/popular/preview{}", limit_query(limit)))
                .await?
        }
        Cmd::Publish { limit } => {
            client
                .post("/v1/admin/popular/publish", &PublishRequest { limit })
                .await?
        }
        Cmd::Decay { step } => {
            client
                .post("/v1/admin/popular/decay", &DecayRequest { step })
                .await?
        }
        Cmd::Leaderboard { limit } => {
            client
                .get(&format!(
                    "/v1/admin/popular/leaderboard{}",
                    limit_query(limit)
                ))
                .await?
        }
        Cmd::Stages { content_id } => {
            client
                .get(&format!("/v1/admin/content/{content_id}/stages"))
                .await?
        }
        Cmd::PublishEvent { file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("read {file}"))?;
            let req: EventRequest = serde_json::from_slice(&bytes).context("parse event json")?;
            client.post("/v1/events", &req).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&resp)?);
    if !resp.success {
        std::process::exit(1);
    }
    Ok(())
}
