use std::fmt::Write;

/// A 12 character (6 entropy bytes) long hex string useful to tag
/// e.g. error messages for identification.
pub fn randomidstring() -> Result<String, getrandom::Error> {
    random_hex(12)
}

/// A lowercase hex string of `len` characters from the OS random
/// source.
pub fn random_hex(len: usize) -> Result<String, getrandom::Error> {
    let mut buf = vec![0u8; (len + 1) / 2];
    getrandom::getrandom(&mut buf)?;
    let mut s = String::with_capacity(buf.len() * 2);
    for byte in buf {
        write!(&mut s, "{:02x}", byte).expect("writing to a String");
    }
    s.truncate(len);
    Ok(s)
}
