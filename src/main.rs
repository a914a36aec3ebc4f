extern crate env_logger;
extern crate gurdulu;

use std::process;
use std::time::Duration;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use gurdulu::{
    CacheClient, ClientConfig, ClientError, Expiration, KeyTransformerKind, LocatorKind, Result,
    SocketPoolConfig, StoreCommand,
};

fn app() -> App<'static, 'static> {
    let key = Arg::with_name("key").required(true).help("Item key");
    let amount = Arg::with_name("amount")
        .default_value("1")
        .help("Amount to add or subtract");

    App::new("gurdulu_cli")
        .about("Talks to a cluster of text protocol cache servers")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("server")
                .long("server")
                .short("s")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .default_value("127.0.0.1:11211")
                .help("Server address, repeat for more servers"),
        )
        .arg(
            Arg::with_name("locator")
                .long("locator")
                .takes_value(true)
                .possible_values(&["ketama", "single"])
                .default_value("ketama"),
        )
        .arg(
            Arg::with_name("key-transformer")
                .long("key-transformer")
                .takes_value(true)
                .possible_values(&["default", "base64", "sha256"])
                .default_value("default"),
        )
        .arg(
            Arg::with_name("min-pool-size")
                .long("min-pool-size")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("max-pool-size")
                .long("max-pool-size")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("timeout")
                .long("timeout")
                .takes_value(true)
                .default_value("10")
                .help("Connect and receive timeout in seconds, 0 waits forever"),
        )
        .subcommand(SubCommand::with_name("get").arg(key.clone()))
        .subcommand(
            SubCommand::with_name("set")
                .arg(key.clone())
                .arg(Arg::with_name("value").required(true))
                .arg(
                    Arg::with_name("ttl")
                        .long("ttl")
                        .takes_value(true)
                        .help("Seconds until the item expires"),
                ),
        )
        .subcommand(SubCommand::with_name("delete").arg(key.clone()))
        .subcommand(
            SubCommand::with_name("incr")
                .arg(key.clone())
                .arg(amount.clone()),
        )
        .subcommand(SubCommand::with_name("decr").arg(key).arg(amount))
        .subcommand(SubCommand::with_name("stats"))
        .subcommand(SubCommand::with_name("flush"))
}

fn parse_number(matches: &ArgMatches, name: &str) -> Result<u64> {
    let value = matches.value_of(name).unwrap_or("0");
    value
        .parse()
        .map_err(|_| ClientError::InvalidArgument(format!("{} is not a number: {}", name, value)))
}

fn config(matches: &ArgMatches) -> Result<ClientConfig> {
    let timeout = match parse_number(matches, "timeout")? {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };
    let socket_pool = SocketPoolConfig {
        min_pool_size: parse_number(matches, "min-pool-size")? as usize,
        max_pool_size: parse_number(matches, "max-pool-size")? as usize,
        connection_timeout: timeout,
        receive_timeout: timeout,
        ..SocketPoolConfig::default()
    };

    let mut config = ClientConfig::default()
        .socket_pool(socket_pool)
        .locator(matches.value_of("locator").unwrap_or("ketama").parse::<LocatorKind>()?)
        .key_transformer(
            matches
                .value_of("key-transformer")
                .unwrap_or("default")
                .parse::<KeyTransformerKind>()?,
        );
    for server in matches.values_of("server").into_iter().flatten() {
        config = config.add_server(server)?;
    }
    Ok(config)
}

fn key<'a>(matches: &'a ArgMatches) -> &'a str {
    matches.value_of("key").unwrap_or_default()
}

fn run(matches: ArgMatches) -> Result<()> {
    let client = CacheClient::new(config(&matches)?)?;

    match matches.subcommand() {
        ("get", Some(sub)) => match client.get(key(sub))? {
            Some(value) => println!("{}", value),
            None => println!("NOT FOUND"),
        },
        ("set", Some(sub)) => {
            let value = sub.value_of("value").unwrap_or_default();
            let expiration = match sub.value_of("ttl") {
                Some(_) => Expiration::valid_for(Duration::from_secs(parse_number(sub, "ttl")?)),
                None => Expiration::never(),
            };
            let stored =
                client.store_with_expiration(StoreCommand::Set, key(sub), value, expiration)?;
            println!("{}", if stored { "STORED" } else { "NOT STORED" });
        }
        ("delete", Some(sub)) => {
            let deleted = client.remove(key(sub))?;
            println!("{}", if deleted { "DELETED" } else { "NOT FOUND" });
        }
        ("incr", Some(sub)) => {
            match client.increment(key(sub), parse_number(sub, "amount")?)? {
                Some(value) => println!("{}", value),
                None => println!("NOT FOUND"),
            }
        }
        ("decr", Some(sub)) => {
            match client.decrement(key(sub), parse_number(sub, "amount")?)? {
                Some(value) => println!("{}", value),
                None => println!("NOT FOUND"),
            }
        }
        ("stats", _) => {
            let stats = client.stats()?;
            for server in stats.servers() {
                println!("{}", server);
                if let Some(values) = stats.server(&server) {
                    let mut names: Vec<&String> = values.keys().collect();
                    names.sort();
                    for name in names {
                        println!("  {} {}", name, values[name]);
                    }
                }
            }
        }
        ("flush", _) => {
            let flushed = client.flush_all()?;
            println!("flushed {} server(s)", flushed);
        }
        _ => {}
    }

    client.dispose();
    Ok(())
}

fn main() {
    env_logger::init();

    let matches = app().get_matches();
    if let Err(err) = run(matches) {
        eprintln!("gurdulu_cli: {}", err);
        process::exit(1);
    }
}
