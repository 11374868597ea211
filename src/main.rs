use simulation::{simulate_presence, simulate_two_peer_sync};
pub mod simulation;

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async_main());
}

async fn async_main() {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            TWO-PEER DOCUMENT SYNC SIMULATION               ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    simulate_two_peer_sync().await;

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║            PRESENCE / LIVENESS SIMULATION                  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    simulate_presence().await;

    println!("\n✓ All simulations completed successfully!");
}
