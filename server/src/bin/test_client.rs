use clap::Parser;
use shared::{InputVector, RECV_BUFFER_SIZE};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Probe client: joins the lobby, readies up and plays a few inputs.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Display name sent after connecting
    #[clap(short, long, default_value = "probe")]
    name: String,
    #[clap(short, long, default_value = "mayro")]
    character: String,
    /// Number of polling rounds before closing
    #[clap(short, long, default_value = "20")]
    rounds: u32,
}

/// Sends one request and waits for its reply.
async fn request(
    stream: &mut TcpStream,
    message: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    stream.write_all(message.as_bytes()).await?;
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let len = stream.read(&mut buf).await?;
    if len == 0 {
        return Err("server closed the connection".into());
    }
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let addr = format!("{}:{}", args.host, args.port);
    let mut stream = TcpStream::connect(&addr).await?;
    println!("Connected to {}", addr);

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let len = stream.read(&mut buf).await?;
    let greeting = String::from_utf8_lossy(&buf[..len]).into_owned();
    if greeting.parse::<u32>().is_err() {
        println!("Server refused us: {}", greeting);
        return Ok(());
    }
    println!("Assigned player key {}", greeting);

    // The name gets no reply; give the server a moment before the next request.
    stream.write_all(args.name.as_bytes()).await?;
    sleep(Duration::from_millis(50)).await;

    let pick = format!(r#"{{"set_perso": "{}"}}"#, args.character);
    println!("set_perso -> {}", request(&mut stream, &pick).await?);
    println!("ready -> {}", request(&mut stream, "ready_for_next_state").await?);

    for round in 0..args.rounds {
        let phase = request(&mut stream, "get_etat").await?;
        println!("Round {}: phase {}", round, phase);

        if phase == "minigame_during" {
            let input = InputVector::new((round % 3) as i32 - 1, 1 - (round % 3) as i32);
            let state = request(&mut stream, &format!("{}|{}", input.x, input.y)).await?;
            println!("  state: {}", state);
        } else {
            println!(
                "  ready -> {}",
                request(&mut stream, "ready_for_next_state").await?
            );
        }

        println!("  info: {}", request(&mut stream, "infos_serveur").await?);
        sleep(Duration::from_millis(500)).await;
    }

    println!("close -> {}", request(&mut stream, "close").await?);
    println!("Test client finished");
    Ok(())
}
