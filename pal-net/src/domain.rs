use std::net::IpAddr;

/// Address family a datagram socket is created in.
///
/// The platform layer owns this list; script bindings only ever see it
/// through [`Domain::NAMES`] and [`Domain::from_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
  /// IPv4.
  Inet,
  /// IPv6.
  Inet6,
}

impl Domain {
  /// Every supported domain, in the same order as [`Domain::NAMES`].
  pub const ALL: [Domain; 2] = [Domain::Inet, Domain::Inet6];

  /// Script-visible identifiers, indexed like [`Domain::ALL`].
  pub const NAMES: [&'static str; 2] = ["INET", "INET6"];

  pub fn name(self) -> &'static str {
    Self::NAMES[self as usize]
  }

  /// Exact, case-sensitive lookup of a script-visible identifier.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|domain| domain.name() == name)
  }

  /// Whether `addr` belongs to this address family.
  pub fn accepts(self, addr: &IpAddr) -> bool {
    matches!(
      (self, addr),
      (Domain::Inet, IpAddr::V4(_)) | (Domain::Inet6, IpAddr::V6(_))
    )
  }

  pub(crate) fn as_raw(self) -> libc::c_int {
    match self {
      Domain::Inet => libc::AF_INET,
      Domain::Inet6 => libc::AF_INET6,
    }
  }
}
