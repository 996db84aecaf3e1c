use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::str::FromStr;

use crate::error::BeamError;

/// A host and port pair identifying a service endpoint.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
  /// Host name or literal address.
  pub host: String,
  /// TCP/UDP port.
  pub port: u16,
}

impl IpAddress {
  /// Constructs an address from a host and port.
  pub fn new<T: Into<String>>(host: T, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
    }
  }
}

impl Display for IpAddress {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{}:{}", self.host, self.port)
  }
}

impl FromStr for IpAddress {
  type Err = BeamError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    let Some((host, port)) = value.rsplit_once(':') else {
      return Err(BeamError::serialization(format!("invalid address: {value}")));
    };

    let port: u16 = port
      .parse()
      .map_err(|_| BeamError::serialization(format!("invalid port: {port}")))?;

    Ok(Self::new(host, port))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::services::IpAddress;

  #[test]
  fn test_parse_round_trip() {
    let address: IpAddress = "locator.example:20000".parse().unwrap();

    assert_eq!(address, IpAddress::new("locator.example", 20000));
    assert_eq!(address.to_string(), "locator.example:20000");
  }

  #[test]
  fn test_parse_rejects_garbage() {
    assert!("no-port".parse::<IpAddress>().is_err());
    assert!("host:not-a-port".parse::<IpAddress>().is_err());
  }
}
