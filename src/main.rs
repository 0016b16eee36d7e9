use anyhow::{Context, bail};
use botobase::{Account, Botobase, Config, Service, logging};
use serde_json::{Map, Value, json};

const USAGE: &str = "用法:
  botobase [-debug <level>] allocate <service> [preferred_id]
  botobase [-debug <level>] report <account_id> <seconds> <data-json>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("加载配置失败")?;
    logging::init_tracing(&cfg);

    let args = command_args();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    let client = Botobase::new(&cfg).context("初始化 broker 客户端失败")?;
    match command.as_str() {
        "allocate" => {
            let service: Service = args
                .get(1)
                .context(USAGE)?
                .parse()
                .context("service 取值无效")?;
            let preferred_id = args
                .get(2)
                .map(|s| s.parse::<i64>())
                .transpose()
                .context("preferred_id 必须是整数")?;

            let account = client
                .allocate_account(service, preferred_id)
                .await
                .with_context(|| format!("分配 {service} 账号失败"))?;
            let out = json!({
                "id": account.id,
                "proxy": account.proxy_url(),
                "credential": account.masked_credential(),
                "extra": account.extra.keys().collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "report" => {
            let (Some(id), Some(seconds), Some(data)) = (args.get(1), args.get(2), args.get(3))
            else {
                bail!("{USAGE}");
            };
            let account = Account {
                id: id.parse().context("account_id 必须是整数")?,
                proxy: None,
                credential: String::new(),
                extra: Map::new(),
            };
            let seconds: f64 = seconds.parse().context("seconds 必须是数字")?;
            let data: Value = serde_json::from_str(data).context("data 不是合法 JSON")?;

            client
                .report_usage(&account, seconds, &data)
                .await
                .with_context(|| format!("上报账号 #{} 用量失败", account.id))?;
            tracing::info!(account_id = account.id, "用量已上报");
        }
        other => bail!("未知命令 {other:?}\n{USAGE}"),
    }

    Ok(())
}

/// 去掉 `-debug <level>`（已在 Config::load 里处理），剩下的是子命令和参数。
fn command_args() -> Vec<String> {
    let mut out = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-debug" {
            args.next();
            continue;
        }
        out.push(arg);
    }
    out
}
