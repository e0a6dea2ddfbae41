mod fixture;
mod test_cleanup;
mod test_lifecycle;
mod test_state;
