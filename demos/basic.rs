// demos/basic.rs
//
// MYSQL_HOST=127.0.0.1 MYSQL_USER=repl MYSQL_PASSWORD=secret cargo run --example basic

use binlog_follower::{Event, Follower, FollowerConfig};

fn env(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let host = env("MYSQL_HOST", "127.0.0.1");
    let port: u16 = env("MYSQL_PORT", "3306").parse()?;
    let user = env("MYSQL_USER", "repl");
    let password = env("MYSQL_PASSWORD", "");
    let follower_id: u32 = env("FOLLOWER_ID", "1077").parse()?;

    let mut follower = Follower::with_config(FollowerConfig::new(follower_id));
    follower.register(&host, port, &user, &password).await?;

    let pos = follower.leader_position().await?;
    println!("leader is at {pos}");

    let mut stream = follower.start_sync(pos).await?;
    loop {
        let container = match stream.next().await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("stream ended: {e}");
                eprintln!("resume from {}", follower.next_position());
                break;
            }
        };

        match container.event {
            Event::Query(q) => println!("query [{}]: {}", q.database_name, q.query),
            Event::TableMap(t) => println!("table map {} -> {}.{}", t.table_id, t.database_name, t.table_name),
            Event::Rows(r) => println!("rows for table {}: {} image(s)", r.table_id, r.rows.len()),
            Event::Xid(x) => println!("commit (xid {})", x.xid),
            Event::Rotate(r) => println!("rotate to {}:{}", r.next_file, r.next_position),
            _ => {}
        }
    }

    follower.close().await;
    Ok(())
}
