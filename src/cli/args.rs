use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pulse-tunnel")]
#[command(author, version, about = "Keeps many authenticated WebSocket sessions alive", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// 日志输出文件（仪表盘运行时默认不输出日志）
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 为每个账号启动 worker
    Run {
        /// 配置文件路径
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// 账号列表文件（JSON）
        #[arg(short, long, default_value = "accounts.json")]
        accounts: String,

        /// 不显示仪表盘，日志直接输出到终端
        #[arg(long)]
        no_dashboard: bool,
    },
    /// 检查配置文件与账号列表
    Check {
        /// 配置文件路径
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// 账号列表文件（JSON，可选）
        #[arg(short, long)]
        accounts: Option<String>,

        /// 输出格式 (text, json)
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// 生成配置模板
    Template {
        /// 输出文件路径（默认输出到标准输出）
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    /// 是否会占用终端显示仪表盘
    pub fn uses_dashboard(&self) -> bool {
        matches!(self.command, Commands::Run { no_dashboard: false, .. })
    }
}
