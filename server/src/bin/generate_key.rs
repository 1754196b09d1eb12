use base64::{engine::general_purpose::STANDARD, Engine as _};
use color_eyre::eyre::{eyre, Result};
use ring::rand::{SecureRandom as _, SystemRandom};

fn main() -> Result<()> {
    color_eyre::install()?;

    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| eyre!("Failed to generate random key"))?;
    let key_string = STANDARD.encode(key);

    println!("Generated transport secret:");
    println!("{}", key_string);
    println!();
    println!("You can use this key as your TRANSPORT_SECRET environment variable.");
    println!("For example, add the following to your .env file:");
    println!("TRANSPORT_SECRET=\"{}\"", key_string);

    Ok(())
}
