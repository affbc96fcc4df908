//! Station file → factory → one lifecycle pass on a mock port.

use daq_device_classes::adapters::MockAdapter;
use daq_device_classes::config::StationConfig;
use daq_device_classes::instrument::{self, Variable};
use daq_device_classes::sequence::{run_cycle, ExitStatus};
use daq_device_classes::DeviceError;

const STATION: &str = r#"
[application]
name = "bench"

[[devices]]
id = "generator"
type = "agilent_33220a"
port = { resource = "192.168.1.20:5025" }

[devices.parameters]
SweepMode = "Frequency in Hz"
Waveform = "Square"
PeriodFrequency = "Frequency in Hz"
PeriodFrequencyValue = 2.0
DutyCyclePulseWidth = "Duty cycle in %"
DutyCyclePulseWidthValue = 25.0

[[devices]]
id = "transient"
type = "keysight_n6705_signal"
port = { resource = "TCPIP0::192.168.1.30::inst0::INSTR" }

[devices.parameters]
Device = "CH3"
SweepMode = "HiLevel in V"
Waveform = "Step"
AmplitudeHiLevel = "HiLevel in V"
DelayPhase = "Delay in s"
DelayPhaseValue = 0.25

[[devices]]
id = "direct"
type = "agilent_n6705a_signal"
port = { resource = "GPIB0::5::INSTR" }

[[devices]]
id = "smu"
type = "keysight_n6705_smu"
port = { resource = "GPIB0::5::INSTR" }

[[devices]]
id = "dmm"
type = "fluke_8842a"
port = { resource = "GPIB0::1::INSTR" }

[devices.parameters]
Mode = "DC current"

[[devices]]
id = "electrometer"
type = "keithley_617"
port = { resource = "GPIB0::27::INSTR" }

[[devices]]
id = "amplifier"
type = "nf_ca5351"
port = { resource = "GPIB0::2::INSTR" }
"#;

fn station() -> StationConfig {
    StationConfig::from_toml_str(STATION).unwrap()
}

fn device(config: &StationConfig, id: &str) -> daq_device_classes::config::DeviceDefinition {
    config
        .devices
        .iter()
        .find(|d| d.id == id)
        .cloned()
        .unwrap()
}

#[test]
fn factory_builds_every_device_type() {
    let config = station();
    let names: Vec<String> = config
        .devices
        .iter()
        .map(|d| instrument::create(d, MockAdapter::new()).unwrap().name())
        .collect();
    assert_eq!(
        names,
        vec![
            "Agilent-33220A",
            "KeysightN6705 CH3",
            "AgilentN6705A CH1",
            "Keysight N6705 CH1",
            "Fluke8842A",
            "Keithley617",
            "NF-CA5351",
        ]
    );
}

#[test]
fn factory_reports_bad_option_strings() {
    let mut config = station();
    config.devices[4]
        .parameters
        .insert("Mode".into(), toml::Value::String("Capacitance".into()));
    let err = instrument::create(&config.devices[4], MockAdapter::new()).err();
    match err {
        Some(DeviceError::Configuration(msg)) => assert!(msg.contains("dmm")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn function_generator_cycle_transcript() {
    let config = station();
    let mut mock = MockAdapter::new();
    mock.on_query("FREQ?", "250");
    let log = mock.log();
    let mut generator = instrument::create(&device(&config, "generator"), mock).unwrap();
    assert_eq!(generator.variables(), vec![Variable::new("Frequency", "Hz")]);

    let summary = run_cycle(generator.as_mut(), Some(250.0)).await.unwrap();
    assert_eq!(summary.exit_status, ExitStatus::Success);
    assert_eq!(summary.values, vec![250.0]);
    assert_eq!(
        log.writes(),
        vec![
            "*RST",
            "VOLT:RANG:AUTO ON",
            "OUTP:LOAD INF",
            "TRIG:SOURCE IMM",
            "FREQ 2; *WAI",
            "VOLT 1; *WAI",
            "VOLT:OFFS 0; *WAI",
            "FUNC:SQUARE:DCYCLE 25; *WAI",
            "FUNC SQU",
            "OUTP ON",
            "OUTP:LOAD INF",
            "TRIG:SOURCE IMM",
            "FREQ 250; *WAI",
            "VOLT 1; *WAI",
            "VOLT:OFFS 0; *WAI",
            "FUNC:SQUARE:DCYCLE 25; *WAI",
            "FREQ?",
            "OUTP OFF",
            "*RST",
            "SYST:LOC",
        ]
    );
}

#[tokio::test]
async fn transient_source_reports_voltage_and_current() {
    let config = station();
    let mut mock = MockAdapter::new();
    // Both queries are written before either reply is read.
    mock.push_response("1.5");
    mock.push_response("0.002");
    let log = mock.log();
    let mut source = instrument::create(&device(&config, "transient"), mock).unwrap();
    let summary = run_cycle(source.as_mut(), Some(1.5)).await.unwrap();
    assert_eq!(summary.value("Voltage in V").unwrap(), 1.5);
    assert_eq!(summary.value("Current in A").unwrap(), 0.002);
    assert!(log
        .writes()
        .contains(&"ARB:VOLTAGE:STEP:END:LEVEL 1.5, (@3); *WAI".to_string()));
}

#[tokio::test]
async fn meter_reading_through_the_factory() {
    let config = station();
    let mut mock = MockAdapter::new();
    mock.push_response("+1.00000E-03,ADC");
    let log = mock.log();
    let mut dmm = instrument::create(&device(&config, "dmm"), mock).unwrap();
    let summary = run_cycle(dmm.as_mut(), None).await.unwrap();
    assert_eq!(summary.value("DC current").unwrap(), 0.001);
    assert_eq!(summary.value("overrange").unwrap(), 0.0);
    assert_eq!(
        log.writes(),
        vec!["*", "X0", "Y1", "N17 P1", "F5", "R0", "S2", "T0", ""]
    );
}
