//! `concierge ask`: one-shot chat from the command line.
//!
//! Boots the same runtime as `serve`, charges the request to a user and
//! prints the reply. Quota rejections and agent failures exit non-zero.

use std::sync::Arc;

use cg_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{handle_chat, ChatError, ChatInput};

pub struct AskArgs {
    pub message: String,
    pub user: Option<String>,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub json: bool,
}

pub async fn run(config: Arc<Config>, args: AskArgs) -> anyhow::Result<()> {
    let user_id = args
        .user
        .unwrap_or_else(|| config.auth.dev_user.clone());
    let state = bootstrap::build_app_state(config).await?;

    let input = ChatInput {
        message: args.message,
        forced_agent: args.agent,
        model: args.model,
        endpoint: Some("cli:ask".into()),
    };

    match handle_chat(&state, &user_id, input).await {
        Ok(outcome) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("[{}] {}", outcome.agent_name, outcome.response_text);
            }
            Ok(())
        }
        Err(ChatError::QuotaExceeded(reason)) => {
            anyhow::bail!("{} ({})", reason.message(), reason.code())
        }
        Err(e) => Err(e.into()),
    }
}
