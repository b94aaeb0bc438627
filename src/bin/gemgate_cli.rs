//!
//! gemgate operator CLI
//! --------------------
//! Small command-line client for poking a running bridge: log in, inspect the
//! current session, and dry-run the route policy the UI enforces.

use anyhow::{anyhow, Result};

use gemgate::client::AuthClient;
use gemgate::identity::{evaluate_route, visible_areas, RouteDecision, SessionStore};

fn state_file() -> String {
    std::env::var("GEMGATE_STATE_FILE").unwrap_or_else(|_| ".gemgate_session.json".to_string())
}

fn base_url() -> String {
    std::env::var("GEMGATE_API_URL").unwrap_or_else(|_| "http://127.0.0.1:7878/api".to_string())
}

fn usage() -> ! {
    eprintln!("usage: gemgate_cli <command> [args]");
    eprintln!("  login <username> <password>   log in and persist the session");
    eprintln!("  logout                        clear the persisted session");
    eprintln!("  whoami                        show role and display name");
    eprintln!("  check <path>                  evaluate the route guard for a path");
    eprintln!("  sidebar                       list feature areas visible to this session");
    eprintln!("  sales                         list sale records");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let store = SessionStore::hydrate(state_file());
    let client = AuthClient::new(&base_url(), store.clone())?;

    match args.first().map(|s| s.as_str()) {
        Some("login") => {
            let (user, pass) = match (args.get(1), args.get(2)) {
                (Some(u), Some(p)) => (u.as_str(), p.as_str()),
                _ => usage(),
            };
            client.login(user, pass).await.map_err(|e| anyhow!("login failed: {}", e))?;
            // Sync role and display name right away so policy commands work.
            client.current_user().await.map_err(|e| anyhow!("user sync failed: {}", e))?;
            println!("logged in as {}", store.full_name().unwrap_or_else(|| "User".to_string()));
        }
        Some("logout") => {
            client.logout();
            println!("logged out");
        }
        Some("whoami") => match client.current_user().await {
            Ok(Some(p)) => {
                println!("{} ({})", p.display_name, p.role.as_str());
                let profile = store.profile();
                if let Some(u) = profile.username {
                    println!("username: {}", u);
                }
                if let Some(l) = profile.last_login {
                    println!("last login: {}", l);
                }
            }
            Ok(None) => println!("not logged in"),
            Err(e) => return Err(anyhow!("whoami failed: {}", e)),
        },
        Some("check") => {
            let path = args.get(1).map(|s| s.as_str()).unwrap_or_else(|| usage());
            let verdict = match evaluate_route(&store, path) {
                RouteDecision::Allow => "allow",
                RouteDecision::RedirectLogin => "redirect to login",
                RouteDecision::RedirectDashboard => "redirect to dashboard",
                RouteDecision::Deny => "deny",
            };
            println!("{} -> {}", path, verdict);
        }
        Some("sidebar") => {
            for area in visible_areas(&store) {
                println!("{}", area);
            }
        }
        Some("sales") => {
            let records = client.list_sales().await.map_err(|e| anyhow!("sales fetch failed: {}", e))?;
            println!("{} record(s)", records.len());
            for r in records {
                println!("{}  {}  {:.2}  {}", r.date, r.customer, r.total, r.pay_mode);
            }
        }
        _ => usage(),
    }
    Ok(())
}
