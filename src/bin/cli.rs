use clap::Parser;

use respkv::client;
use respkv::server::DEFAULT_PORT;
use respkv::Error;

/// Sends a single command to a respkv server and prints the reply.
#[derive(Parser, Debug)]
struct Args {
    /// The server address
    #[arg(long, env = "RESPKV_HOST", default_value = "127.0.0.1")]
    host: String,

    /// The server port
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// The command and its arguments, e.g. `SET name JOHN EX 10`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let reply = client::send((args.host.as_str(), args.port), &args.command.join(" ")).await?;
    println!("{}", reply);

    Ok(())
}
