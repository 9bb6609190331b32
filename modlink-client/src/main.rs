//! Command-line Modbus TCP client

use std::fmt::Formatter;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use modlink::client::*;
use modlink::*;

#[derive(Debug)]
enum Error {
    BadInt(ParseIntError),
    BadCharInBitString(char),
    Request(RequestError),
    Shutdown,
}

#[derive(Parser)]
#[command(name = "modlink-client")]
#[command(about = "A command line program for making Modbus TCP requests using the modlink crate")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1", help = "host name or IP address of the device")]
    host: String,

    #[arg(long, default_value_t = 502, help = "TCP port of the device")]
    port: u16,

    #[arg(short = 'i', long, default_value_t = 1, help = "The unit id of the Modbus device")]
    id: u8,

    #[arg(short = 't', long, default_value_t = 1000, help = "Timeout in milliseconds")]
    timeout: u64,

    #[arg(short = 'p', long, help = "Optional polling period in milliseconds")]
    period: Option<u64>,

    #[arg(short = 'a', long, help = "Receive responses as pushed notifications")]
    active: bool,

    #[arg(long, help = "Print the TCP and RTU frames for the command without connecting")]
    dump: bool,

    #[command(subcommand)]
    command: Operation,
}

#[derive(Subcommand)]
enum Operation {
    #[command(name = "rc", about = "read coils")]
    ReadCoils(ReadArgs),

    #[command(name = "rdi", about = "read discrete inputs")]
    ReadDiscreteInputs(ReadArgs),

    #[command(name = "rhr", about = "read holding registers")]
    ReadHoldingRegisters(ReadArgs),

    #[command(name = "rir", about = "read input registers")]
    ReadInputRegisters(ReadArgs),

    #[command(name = "wsc", about = "write single coil")]
    WriteSingleCoil(WriteSingleCoilArgs),

    #[command(name = "wsr", about = "write single register")]
    WriteSingleRegister(WriteSingleRegisterArgs),

    #[command(name = "wmc", about = "write multiple coils")]
    WriteMultipleCoils(WriteMultipleCoilsArgs),

    #[command(name = "wmr", about = "write multiple registers")]
    WriteMultipleRegisters(WriteMultipleRegistersArgs),
}

#[derive(Args)]
struct ReadArgs {
    #[arg(short = 's', long, help = "the starting address")]
    start: u16,

    #[arg(short = 'q', long, help = "quantity of values")]
    quantity: u16,
}

#[derive(Args)]
struct WriteSingleCoilArgs {
    #[arg(short = 'i', long, help = "the address of the coil")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the coil (true or false)")]
    value: bool,
}

#[derive(Args)]
struct WriteSingleRegisterArgs {
    #[arg(short = 'i', long, help = "the address of the register")]
    index: u16,

    #[arg(short = 'v', long, help = "the value of the register")]
    value: u16,
}

#[derive(Args)]
struct WriteMultipleCoilsArgs {
    #[arg(short = 's', long, help = "the starting address of the coils")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "the values of the coils specified as a string of 1 and 0 (e.g. 10100011)"
    )]
    values: String,
}

#[derive(Args)]
struct WriteMultipleRegistersArgs {
    #[arg(short = 's', long, help = "the starting address of the registers")]
    start: u16,

    #[arg(
        short = 'v',
        long,
        help = "the values of the registers specified as a comma delimited list (e.g. 1,4,7)"
    )]
    values: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    if let Err(ref e) = run().await {
        println!("error: {e}");
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = build_command(&cli.command, UnitId::new(cli.id))?;

    if cli.dump {
        dump(&command)?;
        return Ok(());
    }

    let options = ClientOptions::new(cli.host.as_str(), cli.port)
        .timeout(Duration::from_millis(cli.timeout))
        .active(cli.active)
        .decode(AppDecodeLevel::DataValues.into());

    let (client, mut notifications) = spawn_tcp_client(options);
    client.connect().await?;

    match cli.period {
        None => run_command(&command, &client, &mut notifications).await?,
        Some(period_ms) => {
            let period = Duration::from_millis(period_ms);
            loop {
                if let Err(err) = run_command(&command, &client, &mut notifications).await {
                    tracing::warn!("request failed: {}", err);
                    if client.state().await?.status == ConnectionStatus::Closed {
                        client.connect().await?;
                    }
                }
                tokio::time::sleep(period).await
            }
        }
    }

    client.close().await?;
    Ok(())
}

fn build_command(operation: &Operation, unit_id: UnitId) -> Result<Command, Error> {
    let command = match operation {
        Operation::ReadCoils(args) => Command::read_coils(unit_id, args.start, args.quantity)?,
        Operation::ReadDiscreteInputs(args) => {
            Command::read_discrete_inputs(unit_id, args.start, args.quantity)?
        }
        Operation::ReadHoldingRegisters(args) => {
            Command::read_holding_registers(unit_id, args.start, args.quantity)?
        }
        Operation::ReadInputRegisters(args) => {
            Command::read_input_registers(unit_id, args.start, args.quantity)?
        }
        Operation::WriteSingleCoil(args) => {
            Command::write_single_coil(unit_id, args.index, args.value)
        }
        Operation::WriteSingleRegister(args) => {
            Command::write_single_register(unit_id, args.index, args.value)
        }
        Operation::WriteMultipleCoils(args) => {
            Command::write_multiple_coils(unit_id, args.start, parse_bit_values(&args.values)?)?
        }
        Operation::WriteMultipleRegisters(args) => Command::write_multiple_registers(
            unit_id,
            args.start,
            parse_register_values(&args.values)?,
        )?,
    };
    Ok(command)
}

fn dump(command: &Command) -> Result<(), Error> {
    let payload = codec::encode_request(command)?;
    let tcp = tcp::frame::wrap(&payload, TxId::new(0), command.unit_id())?;
    let rtu = serial::frame::format_adu(command)?;
    println!("{command}");
    println!("TCP: {}", HexDisplay(&tcp));
    println!("RTU: {}", HexDisplay(&rtu));
    Ok(())
}

async fn run_command(
    command: &Command,
    client: &TcpClient,
    notifications: &mut Notifications,
) -> Result<(), Error> {
    let tx_id = client.request(command.clone()).await?;

    let values = if client.state().await?.active {
        loop {
            let notification = notifications.recv().await?;
            if notification.tx_id == tx_id {
                break notification.result?;
            }
        }
    } else {
        client.confirmation().await?
    };

    print_values(command.start_address(), values.as_ref());
    Ok(())
}

fn print_values(start: u16, values: Option<&Values>) {
    match values {
        None => println!("success"),
        Some(Values::Bits(bits)) => {
            for (i, value) in bits.iter().enumerate() {
                println!("index: {} value: {}", start.wrapping_add(i as u16), value)
            }
        }
        Some(Values::Registers(registers)) => {
            for (i, value) in registers.iter().enumerate() {
                println!("index: {} value: {}", start.wrapping_add(i as u16), value)
            }
        }
    }
}

fn parse_bit_values(values_str: &str) -> Result<Vec<bool>, Error> {
    let mut values: Vec<bool> = Vec::new();
    for c in values_str.chars().rev() {
        match c {
            '0' => values.push(false),
            '1' => values.push(true),
            _ => return Err(Error::BadCharInBitString(c)),
        }
    }
    Ok(values)
}

fn parse_register_values(values_str: &str) -> Result<Vec<u16>, ParseIntError> {
    let mut values: Vec<u16> = Vec::new();
    for value in values_str.split(',') {
        values.push(u16::from_str(value.trim())?);
    }
    Ok(values)
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            Error::BadInt(err) => err.fmt(f),
            Error::BadCharInBitString(char) => write!(f, "Bad character in bit string: {char}"),
            Error::Request(err) => err.fmt(f),
            Error::Shutdown => f.write_str("client was shut down"),
        }
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::Request(err)
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Self {
        Error::BadInt(err)
    }
}

impl From<InvalidRequest> for Error {
    fn from(err: InvalidRequest) -> Self {
        Error::Request(err.into())
    }
}

impl From<Shutdown> for Error {
    fn from(_: Shutdown) -> Self {
        Self::Shutdown
    }
}
