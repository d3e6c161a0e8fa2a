//! Control table addresses of SCS series servos.

// EEPROM, read only
pub const VERSION_L: u8 = 3;
pub const VERSION_H: u8 = 4;

// EEPROM, read/write
pub const ID: u8 = 5;
pub const BAUD_RATE: u8 = 6;
pub const RETURN_DELAY_TIME: u8 = 7;
pub const RETURN_LEVEL: u8 = 8;
pub const MIN_ANGLE_LIMIT_L: u8 = 9;
pub const MIN_ANGLE_LIMIT_H: u8 = 10;
pub const MAX_ANGLE_LIMIT_L: u8 = 11;
pub const MAX_ANGLE_LIMIT_H: u8 = 12;

// SRAM, read/write
pub const TORQUE_ENABLE: u8 = 40;
pub const GOAL_POSITION_LOW: u8 = 42;
pub const GOAL_POSITION_HIGH: u8 = 43;
pub const GOAL_TIME_LOW: u8 = 44;
pub const GOAL_TIME_HIGH: u8 = 45;
pub const GOAL_SPEED_LOW: u8 = 46;
pub const GOAL_SPEED_HIGH: u8 = 47;
pub const LOCK: u8 = 48;

// SRAM, read only
pub const PRESENT_POSITION_LOW: u8 = 56;
pub const PRESENT_POSITION_HIGH: u8 = 57;
pub const PRESENT_SPEED_LOW: u8 = 58;
pub const PRESENT_SPEED_HIGH: u8 = 59;
pub const PRESENT_LOAD_LOW: u8 = 60;
pub const PRESENT_LOAD_HIGH: u8 = 61;
pub const PRESENT_VOLTAGE: u8 = 62;
pub const PRESENT_TEMPERATURE: u8 = 63;
pub const MOVING: u8 = 66;

/// Size of the addressable control table.
pub const TABLE_SIZE: usize = 128;
