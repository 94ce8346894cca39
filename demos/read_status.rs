use std::env;

use coolpak6000::{client::CoolpakClient, status::field_label, transport::DEFAULT_BAUD_RATE};
use inquire::Select;

// Identify the adapter by its USB manufacturer string.
const MANUFACTURER: &str = "Prolific";

fn main() {
    // Get serial port from command line arg, the first matching adapter, or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        if let Ok(Some(port)) = coolpak6000::transport::discover_port(MANUFACTURER) {
            println!("Found unit in port: {}", port);
            return port;
        }

        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");
        if ports.is_empty() {
            eprintln!("Unit is not connected or found, exiting...");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    let mut unit =
        CoolpakClient::open(&port_name, DEFAULT_BAUD_RATE).expect("Failed to open serial port");

    match unit.query_status() {
        Ok(status) => {
            println!("COOLPAK status is: {}", status.raw().as_slice().join("/"));
            for (label, value) in status.raw().labelled() {
                println!("{} : {}", label, value);
            }
            println!("Commanded power: {:?}", status.commanded_power);
            println!("Actual power: {:?}", status.actual_power);
            if let Some(hours) = status.hours() {
                println!("Running hours: {}", hours);
            }
        }
        Err(coolpak6000::error::Error::MalformedResponse { fields }) => {
            println!("Warning: length of the response is strange. Try interpreting anyway...");
            for (index, value) in fields.iter().enumerate() {
                println!("{} : {}", field_label(index).unwrap_or("?"), value);
            }
        }
        Err(err) => println!("Status request failed: {}", err),
    }

    unit.close();
}
