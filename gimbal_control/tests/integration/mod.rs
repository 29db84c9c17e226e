mod calibration;
mod failsafe;
mod periodicity;
mod support;
mod warmup;
