pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub mod test_support;
