pub mod battery_task;
