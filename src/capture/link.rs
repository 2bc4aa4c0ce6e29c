//! Kernel link lookups

use crate::protocol::MacAddr;
use std::ffi::CString;

/// Interface index for `name`, or `None` if no such link exists.
pub fn interface_index(name: &str) -> Option<u32> {
    let name = CString::new(name).ok()?;
    let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
    (ifindex != 0).then_some(ifindex)
}

/// Whether a link with this index currently exists.
pub fn interface_exists(ifindex: u32) -> bool {
    let mut name = [0 as libc::c_char; libc::IF_NAMESIZE];
    !unsafe { libc::if_indextoname(ifindex, name.as_mut_ptr()) }.is_null()
}

/// MAC address from /sys/class/net/{name}/address
pub fn interface_mac(name: &str) -> Option<MacAddr> {
    let path = format!("/sys/class/net/{}/address", name);
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
