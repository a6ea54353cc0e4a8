// ==========================================
// 煤炭出口业务系统 - 命令行入口
// ==========================================
// 用法:
//   coal-export-allocation [--db PATH] supply-status SUPPLY_ID
//   coal-export-allocation [--db PATH] export-status EXPORT_ID
//   coal-export-allocation [--db PATH] suggest EXPORT_ID [STRATEGY]
//   coal-export-allocation [--db PATH] auto EXPORT_ID [STRATEGY] [--dry-run]
//
// 输出为格式化 JSON；状态查询的实体不存在时输出 null。
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use coal_export_allocation::api::AllocationApi;
use coal_export_allocation::app::{get_default_db_path, AppState};
use coal_export_allocation::engine::{AllocationStrategy, AutoAllocateRequest, SuggestionRequest};
use coal_export_allocation::logging;
use serde::Serialize;

const USAGE: &str = "usage: coal-export-allocation [--db PATH] \
<supply-status ID | export-status ID | suggest EXPORT_ID [STRATEGY] | auto EXPORT_ID [STRATEGY] [--dry-run]>";

fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let db_path = match args.iter().position(|a| a == "--db") {
        Some(i) => {
            if i + 1 >= args.len() {
                bail!("--db 需要路径参数\n{}", USAGE);
            }
            let path = args.remove(i + 1);
            args.remove(i);
            path
        }
        None => get_default_db_path(),
    };

    let dry_run = match args.iter().position(|a| a == "--dry-run") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    tracing::info!("使用数据库: {}", state.get_db_path());
    let api = state.allocation_api.as_ref();

    let command = args.first().map(String::as_str).ok_or_else(|| anyhow!(USAGE))?;
    match command {
        "supply-status" => print_json(&api.supply_status(parse_id(&args, 1)?)?),
        "export-status" => print_json(&api.export_status(parse_id(&args, 1)?)?),
        "suggest" => suggest(api, &args),
        "auto" => {
            let request = AutoAllocateRequest {
                export_id: parse_id(&args, 1)?,
                strategy: parse_strategy(&args, 2)?,
                dry_run,
            };
            print_json(&api.auto_allocate(&request)?)
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

fn suggest(api: &AllocationApi, args: &[String]) -> Result<()> {
    let mut request = SuggestionRequest::new(parse_id(args, 1)?);
    if let Some(strategy) = parse_strategy(args, 2)? {
        request = request.with_strategy(strategy);
    }
    print_json(&api.suggest_allocations(&request)?)
}

fn parse_id(args: &[String], index: usize) -> Result<i64> {
    let raw = args.get(index).ok_or_else(|| anyhow!(USAGE))?;
    raw.parse::<i64>().with_context(|| format!("无效的 ID: {}", raw))
}

fn parse_strategy(args: &[String], index: usize) -> Result<Option<AllocationStrategy>> {
    args.get(index)
        .map(|raw| raw.parse::<AllocationStrategy>().map_err(|e| anyhow!(e)))
        .transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
