pub mod checkin_sweep;
