pub mod async_task;

pub mod time;

#[cfg(test)]
mod time_test;
