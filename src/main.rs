mod config;
mod engine;
mod library;
mod playback;
mod present;
mod runtime;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
