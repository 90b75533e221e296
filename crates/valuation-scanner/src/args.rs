use analysis_orchestrator::WatchList;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const USAGE: &str = "\
Usage:
  valuation-scanner --tickers AMD NVDA ...   Evaluate specific tickers
  valuation-scanner --all                    Every ticker in the stock map
  valuation-scanner --industry NAME          Every ticker in one industry

Options:
  --only-undervalued   Report undervalued tickers only
  --email              Send the report by e-mail (SMTP_* settings)
  --stock-map PATH     Peer mapping table (default: STOCK_MAP_PATH or stock_map.json)

Weekly report:
  valuation-scanner --all --only-undervalued --email";

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub watch_list: WatchList,
    pub only_undervalued: bool,
    pub email: bool,
    pub stock_map: Option<PathBuf>,
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .filter(|v| !v.starts_with("--"))
        .map(|s| s.as_str())
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let only_undervalued = args.iter().any(|a| a == "--only-undervalued");
        let email = args.iter().any(|a| a == "--email");
        let stock_map = value_after(args, "--stock-map").map(PathBuf::from);

        let watch_list = if args.iter().any(|a| a == "--all") {
            WatchList::All
        } else if let Some(idx) = args.iter().position(|a| a == "--industry") {
            // Industry names may contain spaces: join everything up to the next flag
            let name = args[idx + 1..]
                .iter()
                .take_while(|a| !a.starts_with("--"))
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                bail!("--industry needs a name");
            }
            WatchList::Industry(name)
        } else if let Some(idx) = args.iter().position(|a| a == "--tickers") {
            let tickers: Vec<String> = args[idx + 1..]
                .iter()
                .take_while(|a| !a.starts_with("--"))
                .flat_map(|a| a.split(','))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if tickers.is_empty() {
                bail!("--tickers needs at least one ticker");
            }
            WatchList::Custom(tickers)
        } else {
            bail!("no tickers selected");
        };

        Ok(Self {
            watch_list,
            only_undervalued,
            email,
            stock_map,
        })
    }

    pub fn report_title(&self) -> String {
        if self.only_undervalued {
            "Weekly Undervalued Stocks".to_string()
        } else {
            match &self.watch_list {
                WatchList::Industry(name) => format!("Valuation Scan: {}", name),
                _ => "Valuation Scan".to_string(),
            }
        }
    }
}
