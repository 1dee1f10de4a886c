//! Port allocation within a configured range.

use isoforge_shared::errors::{BuildError, BuildResult};
use rand::Rng;
use std::net::{IpAddr, SocketAddr, TcpListener};

/// Bind the first free port in `min..=max`, starting the scan at a random offset.
///
/// Every port in the range is tried at most once; exhaustion is an error,
/// not a retry. The returned listener keeps the port reserved.
pub fn bind_in_range<R: Rng + ?Sized>(
    rng: &mut R,
    host: IpAddr,
    min: u16,
    max: u16,
) -> BuildResult<TcpListener> {
    if min > max {
        return Err(BuildError::Network(format!(
            "invalid port range {}-{}",
            min, max
        )));
    }

    let span = u32::from(max - min) + 1;
    let offset = rng.random_range(0..span);

    for i in 0..span {
        let port = min + ((offset + i) % span) as u16;
        match TcpListener::bind(SocketAddr::new(host, port)) {
            Ok(listener) => {
                tracing::debug!(port, "Allocated port");
                return Ok(listener);
            }
            Err(e) => tracing::trace!(port, "Port unavailable: {}", e),
        }
    }

    Err(BuildError::Network(format!(
        "no free port in range {}-{}",
        min, max
    )))
}

/// Find a free port in `min..=max` without keeping it reserved.
pub fn find_free_port<R: Rng + ?Sized>(
    rng: &mut R,
    host: IpAddr,
    min: u16,
    max: u16,
) -> BuildResult<u16> {
    let listener = bind_in_range(rng, host, min, max)?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::net::Ipv4Addr;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_port_within_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let anchor = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let base = anchor.local_addr().unwrap().port();
        drop(anchor);

        let min = base.saturating_sub(100).max(1024);
        let max = min.saturating_add(100);
        let port = find_free_port(&mut rng, LOCALHOST, min, max).unwrap();
        assert!((min..=max).contains(&port));
    }

    #[test]
    fn test_single_port_range_exhausted() {
        let mut rng = StdRng::seed_from_u64(1);
        let held = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = held.local_addr().unwrap().port();

        let err = bind_in_range(&mut rng, LOCALHOST, port, port).unwrap_err();
        assert!(err.to_string().contains("no free port"));
    }

    #[test]
    fn test_inverted_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(bind_in_range(&mut rng, LOCALHOST, 9000, 8000).is_err());
    }
}
