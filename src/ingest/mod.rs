pub mod vitalweather;

#[cfg(test)]
pub(crate) mod fixtures;
