//! Console banner printed once the listener is up.

use std::net::IpAddr;

const RULE_WIDTH: usize = 60;

/// Render the startup banner for a server on `port` reachable at `local_ip`.
pub fn render_banner(port: u16, local_ip: IpAddr) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let network_url = format!("https://{}:{}", local_ip, port);

    [
        rule.clone(),
        "🚀 HTTPS Development Server started!".to_string(),
        rule.clone(),
        format!("📱 Local:        https://localhost:{}", port),
        format!("🌐 Network:      {}", network_url),
        rule.clone(),
        "📋 Setup steps:".to_string(),
        format!("1. Open {} in browser", network_url),
        "2. Accept the self-signed certificate".to_string(),
        "3. Allow camera access when prompted".to_string(),
        format!("4. Redirect URI: {}/", network_url),
        rule.clone(),
        "⏹️  To stop: Ctrl+C".to_string(),
        rule,
    ]
    .join("\n")
}

pub fn print_banner(port: u16, local_ip: IpAddr) {
    println!("{}", render_banner(port, local_ip));
}
