mod fakes;
mod test_fsm;
mod test_hostname;
mod test_pool;
mod test_registry;
