// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use dotenv::dotenv;
use numclient::{setup_tracing, AppError, AppResult, Client, ClientConfig, Identity, GLOBAL_CONFIG};
use std::path::PathBuf;
use tokio::runtime;

#[derive(Parser)]
#[command(version)]
pub struct CommandLine {
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// server host, overrides the config file
    #[arg(long)]
    pub host: Option<String>,
    /// server port, overrides the config file
    #[arg(long)]
    pub port: Option<u16>,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// log level (v: debug, vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Parser)]
pub enum Command {
    PrintConfig,
}

fn main() -> AppResult<()> {
    // 加载 .env 文件
    dotenv().ok();

    //setup config
    let commandline: CommandLine = CommandLine::parse();
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let mut client_config = ClientConfig::set_up_config(config_path)?;
    if let Some(host) = commandline.host {
        client_config.network.host = host;
    }
    if let Some(port) = commandline.port {
        client_config.network.port = port;
    }
    client_config.validate()?;

    if let Some(Command::PrintConfig) = commandline.command {
        println!("{:#?}", client_config);
        return Ok(());
    }

    let identity = Identity::generate();
    let _log_guard = setup_tracing(&client_config.log, &identity, commandline.verbose)?;

    GLOBAL_CONFIG
        .set(client_config)
        .map_err(|_| AppError::IllegalStateError("client config already set".to_string()))?;

    // startup tokio runtime
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;

    let client = Client::new(numclient::global_config().clone(), identity);
    client.start(&rt)?;

    Ok(())
}
