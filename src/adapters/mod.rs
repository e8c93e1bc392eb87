//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements       | Connects to                   |
//! |------------|------------------|-------------------------------|
//! | `hardware` | AnalogPort       | ESP32 ADC1 (Vsense, Isense)   |
//! |            | ActuatorPort     | LEDC charge PWM, relay GPIO   |
//! |            | IndicatorPort    | LED GPIOs                     |
//! |            | DisplayPort      | Serial log                    |
//! |            | WatchdogPort     | ESP-IDF TWDT                  |
//! |            | TimerPort        | esp_timer blink callback      |

pub mod hardware;
