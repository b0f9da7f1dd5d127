use seaport::{
    Propagation, ProtocolTable, Reactor, SeaportConfig, SeaportResult, SessionEvent,
};

fn main() -> SeaportResult<()> {
    env_logger::init();

    // Load configuration
    let config = match SeaportConfig::load_from_file("seaport.conf") {
        Ok(config) => {
            println!("✓ Configuration loaded from seaport.conf");
            config
        }
        Err(e) => {
            eprintln!("Config error: {}. Using defaults.", e);
            SeaportConfig::default()
        }
    };

    print_startup_banner(&config);

    let welcome = config.service.welcome.clone();
    let service_name = config.service.name.clone();

    let mut reactor = Reactor::new(config, ProtocolTable::standard())?;

    // A small chat room: every line a guest sends is relayed to everyone
    // else, and joins and departures are announced
    reactor.bus_mut().on_connect(Box::new(move |registry, id, _| {
        if let Some(conn) = registry.by_id_mut(id) {
            conn.send_text(&format!("{}\n", service_name));
            conn.send_text(&format!("{}\n", welcome));
        }
        registry.send_to_all(&format!("* guest-{} has joined\n", id), Some(id));
        Propagation::Continue
    }));

    reactor.bus_mut().on_receive(Box::new(|registry, id, event| {
        if let SessionEvent::Receive(data) = event {
            let line = String::from_utf8_lossy(data);
            let line = line.trim();
            if line.is_empty() {
                return Propagation::Continue;
            }
            registry.send_to_all(&format!("[guest-{}] {}\n", id, line), None);
        }
        Propagation::Continue
    }));

    reactor.bus_mut().on_disconnect(Box::new(|registry, id, _| {
        registry.send_to_all(&format!("* guest-{} has left\n", id), Some(id));
        Propagation::Continue
    }));

    let addr = reactor.bind()?;
    println!("🚀 Listening on {}", addr);
    println!("📞 Connect with: telnet {} {}", addr.ip(), addr.port());
    println!("\nPress Ctrl+C to stop the server\n");

    reactor.listen()
}

fn print_startup_banner(config: &SeaportConfig) {
    println!();
    println!("  {} v{}", config.service.name, seaport::VERSION);
    println!("  mode: {}", config.server.mode.name());
    println!(
        "  idle timeout: {}s, poll interval: {}ms",
        config.timeouts.idle_timeout.as_secs(),
        config.timeouts.poll_interval.as_millis()
    );
    println!();
}
