// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Process entrypoint. Loads `.env`, resolves `NODE_ENV` into a config
//! file name, and runs every configured chain until shutdown (§6).

use dotenvy::dotenv;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let env = std::env::var("NODE_ENV").unwrap_or_else(|_| "development".to_string());

    // USE_DOCKER selects a `redis` backing-store hostname in the original
    // system; this crate only ships `InMemoryBackend` today (see DESIGN.md),
    // so the variable is accepted but not yet wired to a real connection.
    let _use_docker = std::env::var("USE_DOCKER").is_ok();

    let exit_code = incentivized_relayer::runtime::run(&env).await;
    std::process::exit(exit_code);
}
