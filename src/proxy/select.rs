//! Backend selection: `FNV-1a(client_remote_addr) mod
//! count(healthy_backends)`.

use crate::proxy::backend::Backend;
use crate::proxy::hash::fnv1a;

/// Chooses a backend for `remote_addr` from among the currently healthy
/// ones. Returns `None` if no backend is healthy.
pub fn choose_backend<'a>(backends: &'a [Backend], remote_addr: &str) -> Option<&'a Backend> {
    let healthy: Vec<&Backend> = backends.iter().filter(|b| b.is_healthy()).collect();
    if healthy.is_empty() {
        return None;
    }
    let index = (fnv1a(remote_addr.as_bytes()) % healthy.len() as u64) as usize;
    Some(healthy[index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_when_no_backend_is_healthy() {
        let backends = vec![Backend::new("a:1"), Backend::new("b:1")];
        for b in &backends {
            b.set_healthy(false);
        }
        assert!(choose_backend(&backends, "1.2.3.4:5").is_none());
    }

    #[test]
    fn is_deterministic_for_a_fixed_healthy_set() {
        let backends = vec![Backend::new("a:1"), Backend::new("b:1"), Backend::new("c:1")];
        let first = choose_backend(&backends, "1.2.3.4:5").unwrap().address.clone();
        let second = choose_backend(&backends, "1.2.3.4:5").unwrap().address.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn skips_unhealthy_backends() {
        let backends = vec![Backend::new("a:1"), Backend::new("b:1")];
        backends[0].set_healthy(false);
        let chosen = choose_backend(&backends, "1.2.3.4:5").unwrap();
        assert_eq!(chosen.address, "b:1");
    }
}
