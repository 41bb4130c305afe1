use pal_net::Domain;

/// Binding configuration, passed to [`load`](crate::load).
///
/// ```rust
/// use ludp::{Config, Domain};
///
/// let config = Config::new()
///   .domains([("INET", Domain::Inet)])
///   .gc_step_kbytes(16);
/// assert_eq!(config.domain("INET"), Some(Domain::Inet));
/// assert_eq!(config.domain("INET6"), None);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
  domains: Vec<(String, Domain)>,
  gc_step_kbytes: i32,
  collect_after_dispatch: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      domains: Domain::ALL
        .into_iter()
        .map(|domain| (domain.name().to_owned(), domain))
        .collect(),
      gc_step_kbytes: 0,
      collect_after_dispatch: true,
    }
  }
}

impl Config {
  /// The platform's domain list, with a basic collector step after every
  /// dispatched event.
  pub fn new() -> Self {
    Self::default()
  }

  /// Replaces the names `open` accepts.
  pub fn domains<I, S>(mut self, domains: I) -> Self
  where
    I: IntoIterator<Item = (S, Domain)>,
    S: Into<String>,
  {
    self.domains =
      domains.into_iter().map(|(name, domain)| (name.into(), domain)).collect();
    self
  }

  /// Size of the incremental collector step offered after each dispatch.
  /// `0` performs one basic step.
  pub fn gc_step_kbytes(mut self, kbytes: i32) -> Self {
    self.gc_step_kbytes = kbytes.max(0);
    self
  }

  pub fn collect_after_dispatch(mut self, enabled: bool) -> Self {
    self.collect_after_dispatch = enabled;
    self
  }

  pub fn domain(&self, name: &str) -> Option<Domain> {
    self
      .domains
      .iter()
      .find(|(candidate, _)| candidate == name)
      .map(|(_, domain)| *domain)
  }

  pub(crate) fn step_kbytes(&self) -> Option<i32> {
    self.collect_after_dispatch.then_some(self.gc_step_kbytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_follow_platform_names() {
    let config = Config::default();
    for domain in Domain::ALL {
      assert_eq!(config.domain(domain.name()), Some(domain));
    }
    assert_eq!(config.domain("bogus-domain"), None);
    assert_eq!(config.step_kbytes(), Some(0));
  }

  #[test]
  fn negative_step_is_clamped() {
    assert_eq!(Config::new().gc_step_kbytes(-5).step_kbytes(), Some(0));
    assert_eq!(Config::new().collect_after_dispatch(false).step_kbytes(), None);
  }
}
