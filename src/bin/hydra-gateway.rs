use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("usage: hydra-gateway <config.json> [--listen HOST:PORT] [--admin-listen HOST:PORT]")?;

    let mut listen: Option<String> = None;
    let mut admin_listen: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--listen" | "--addr" => {
                listen = Some(args.next().ok_or("missing value for --listen/--addr")?);
            }
            "--admin-listen" => {
                admin_listen = Some(args.next().ok_or("missing value for --admin-listen")?);
            }
            other => return Err(format!("unknown arg: {other}").into()),
        }
    }

    let raw = std::fs::read_to_string(&path)?;
    let config: hydra_llm::GatewayConfig = serde_json::from_str(&raw)?;

    let listen = listen.unwrap_or_else(|| format!("0.0.0.0:{}", config.server.port));
    let admin_listen =
        admin_listen.unwrap_or_else(|| format!("0.0.0.0:{}", config.server.admin_port));

    let gateway = Arc::new(hydra_llm::Gateway::new(config)?);
    println!(
        "hydra-gateway providers: {}",
        gateway
            .enabled_providers()
            .iter()
            .map(|kind| kind.id())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let app = hydra_llm::gateway::http::router(gateway.clone());
    let admin_app = hydra_llm::gateway::http::admin_router(gateway);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    let admin_listener = tokio::net::TcpListener::bind(&admin_listen).await?;
    println!("hydra-gateway listening on {listen} (admin on {admin_listen})");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(admin_listener, admin_app).await {
            eprintln!("admin listener failed: {err}");
        }
    });
    axum::serve(listener, app).await?;
    Ok(())
}
