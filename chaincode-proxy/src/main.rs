//! The chaincode proxy binary.
//!
//! ## Authors
//!
//! The Chaincode TEE Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.markdown` in the Chaincode TEE root directory for
//! licensing and copyright information.

use std::path::Path;

use clap::{App, Arg};
use log::info;

use chaincode_proxy::{serve, ProxyError};

fn main() -> Result<(), ProxyError> {
    env_logger::init();

    let matches = App::new("chaincode-proxy")
        .version("0.1.0")
        .author("The Chaincode TEE Development Team")
        .about("Relays chaincode invocations between the wrapper and the trusted runtime.")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .default_value("50051")
                .help("Port to listen on for wrapper connections"),
        )
        .arg(
            Arg::with_name("chaincode-directory")
                .short("c")
                .long("chaincode-directory")
                .takes_value(true)
                .default_value("chaincode")
                .help("Directory the contract bytecode files are served from"),
        )
        .arg(
            Arg::with_name("heap-size")
                .long("heap-size")
                .takes_value(true)
                .default_value("10485760")
                .help("Guest heap pool, in bytes"),
        )
        .get_matches();

    let port = matches
        .value_of("port")
        .ok_or_else(|| ProxyError::CommandLineArguments(String::from("no port supplied")))?
        .parse::<u16>()
        .map_err(|err| ProxyError::CommandLineArguments(format!("bad port: {}", err)))?;
    let chaincode_directory = matches
        .value_of("chaincode-directory")
        .ok_or_else(|| {
            ProxyError::CommandLineArguments(String::from("no chaincode directory supplied"))
        })?;
    let heap_size = matches
        .value_of("heap-size")
        .ok_or_else(|| ProxyError::CommandLineArguments(String::from("no heap size supplied")))?
        .parse::<u32>()
        .map_err(|err| ProxyError::CommandLineArguments(format!("bad heap size: {}", err)))?;

    info!("Starting the chaincode proxy.");
    serve(
        &format!("0.0.0.0:{}", port),
        Path::new(chaincode_directory),
        heap_size,
    )
}
