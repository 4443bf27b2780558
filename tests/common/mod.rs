//! Scripted transport and recording sink for driving the register
//! walk on the host.

use std::collections::{HashMap, VecDeque};

use smart_battery_manager::manager::{BatteryEvent, BatteryEventSender};
use smart_battery_manager::registers::{battery_cmd, manager_cmd, BATTERY_ADDR, MANAGER_ADDR};
use smart_battery_manager::sink::BatterySink;
use smart_battery_manager::snapshot::{BatterySnapshot, ChargeStatusReason};
use smart_battery_manager::transport::{
    BlockCompletion, SmbusTransport, TransactionStatus, WordCompletion,
};

/// One bus transaction as the transport saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Txn {
    pub addr: u8,
    pub command: u8,
    pub write: bool,
}

pub fn read(addr: u8, command: u8) -> Txn {
    Txn {
        addr,
        command,
        write: false,
    }
}

pub fn write(addr: u8, command: u8) -> Txn {
    Txn {
        addr,
        command,
        write: true,
    }
}

/// Injects an event into the battery channel the moment a given
/// command is served, emulating an external happening that lands while
/// the transaction is on the wire.
pub struct EventTrigger<'a> {
    pub addr: u8,
    pub command: u8,
    pub sender: BatteryEventSender<'a>,
    pub event: BatteryEvent,
    pub fired: bool,
}

/// Bus double: serves word/block values from a register map, with
/// per-register queues of scripted completions that take precedence
/// (for failure-then-recovery sequences), and logs every transaction.
pub struct ScriptedTransport<'a> {
    pub words: HashMap<(u8, u8), u16>,
    pub blocks: HashMap<(u8, u8), Vec<u8>>,
    pub word_scripts: HashMap<(u8, u8), VecDeque<WordCompletion>>,
    pub log: Vec<Txn>,
    pub writes: Vec<(u8, u8, u16)>,
    pub triggers: Vec<EventTrigger<'a>>,
}

impl<'a> ScriptedTransport<'a> {
    pub fn new() -> ScriptedTransport<'a> {
        ScriptedTransport {
            words: HashMap::new(),
            blocks: HashMap::new(),
            word_scripts: HashMap::new(),
            log: Vec::new(),
            writes: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn script_word(&mut self, addr: u8, command: u8, completion: WordCompletion) {
        self.word_scripts
            .entry((addr, command))
            .or_default()
            .push_back(completion);
    }

    pub fn trigger_on(
        &mut self,
        addr: u8,
        command: u8,
        sender: BatteryEventSender<'a>,
        event: BatteryEvent,
    ) {
        self.triggers.push(EventTrigger {
            addr,
            command,
            sender,
            event,
            fired: false,
        });
    }

    /// Commands actually issued, in order.
    pub fn commands(&self) -> Vec<Txn> {
        self.log.clone()
    }

    fn serve(&mut self, addr: u8, command: u8, write: bool) {
        self.log.push(Txn {
            addr,
            command,
            write,
        });
        for trigger in self.triggers.iter_mut() {
            if !trigger.fired && trigger.addr == addr && trigger.command == command {
                trigger.fired = true;
                trigger.sender.try_send(trigger.event).unwrap();
            }
        }
    }
}

impl SmbusTransport for ScriptedTransport<'_> {
    async fn read_word(&mut self, addr: u8, command: u8) -> WordCompletion {
        self.serve(addr, command, false);
        if let Some(queue) = self.word_scripts.get_mut(&(addr, command)) {
            if let Some(completion) = queue.pop_front() {
                return completion;
            }
        }
        WordCompletion {
            status: TransactionStatus::Ok,
            value: self.words.get(&(addr, command)).copied().unwrap_or(0),
        }
    }

    async fn write_word(&mut self, addr: u8, command: u8, value: u16) -> TransactionStatus {
        self.serve(addr, command, true);
        self.writes.push((addr, command, value));
        TransactionStatus::Ok
    }

    async fn read_block(&mut self, addr: u8, command: u8) -> BlockCompletion {
        self.serve(addr, command, false);
        let mut data = heapless::Vec::new();
        if let Some(bytes) = self.blocks.get(&(addr, command)) {
            data.extend_from_slice(bytes).unwrap();
        }
        BlockCompletion {
            status: TransactionStatus::Ok,
            data,
        }
    }
}

/// A healthy pack on AC, mid-charge: the baseline register map the
/// walk tests start from.
pub fn stock_transport<'a>() -> ScriptedTransport<'a> {
    let mut t = ScriptedTransport::new();

    // manager: AC present and good, battery A present and charging
    t.words
        .insert((MANAGER_ADDR, manager_cmd::BATTERY_SYSTEM_STATE_CONT), 0x0001);
    t.words
        .insert((MANAGER_ADDR, manager_cmd::BATTERY_SYSTEM_STATE), 0x0011);

    t.words.insert((BATTERY_ADDR, battery_cmd::BATTERY_STATUS), 0x0000);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::REMAINING_CAPACITY), 4120);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::FULL_CHARGE_CAPACITY), 5200);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::AVERAGE_CURRENT), 1250);
    t.words.insert((BATTERY_ADDR, battery_cmd::VOLTAGE), 12300);
    t.words.insert((BATTERY_ADDR, battery_cmd::MAX_ERROR), 2);
    t.words.insert((BATTERY_ADDR, battery_cmd::CYCLE_COUNT), 87);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::AVERAGE_TIME_TO_EMPTY), 480);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::RUN_TIME_TO_EMPTY), 473);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::AVERAGE_TIME_TO_FULL), 96);
    t.words.insert((BATTERY_ADDR, battery_cmd::TEMPERATURE), 2981);
    t.words.insert((BATTERY_ADDR, battery_cmd::CURRENT), 1190);

    t.words
        .insert((BATTERY_ADDR, battery_cmd::MANUFACTURE_DATE), 0x4EF7);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::SERIAL_NUMBER), 0x2f01);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::DESIGN_CAPACITY), 5600);
    t.words.insert((BATTERY_ADDR, battery_cmd::PACK_RESERVE), 200);

    t.words
        .insert((BATTERY_ADDR, battery_cmd::CELL_VOLTAGE_1), 3012);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::CELL_VOLTAGE_2), 3010);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::CELL_VOLTAGE_3), 3008);
    t.words
        .insert((BATTERY_ADDR, battery_cmd::CELL_VOLTAGE_4), 3011);

    t.blocks.insert(
        (BATTERY_ADDR, battery_cmd::MANUFACTURER_NAME),
        b"PACKMAKER".to_vec(),
    );
    t.blocks.insert(
        (BATTERY_ADDR, battery_cmd::MANUFACTURER_DATA),
        vec![0x12, 0x34, 0x56, 0x78],
    );
    t.blocks.insert(
        (BATTERY_ADDR, battery_cmd::DEVICE_NAME),
        b"bq20z451".to_vec(),
    );
    t.blocks.insert(
        (BATTERY_ADDR, battery_cmd::HARDWARE_SERIAL),
        b"D865033P1KXLQA".to_vec(),
    );

    t
}

/// Sink double: remembers the latest value of every setter and counts
/// the notification calls.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub battery_installed: Option<bool>,
    pub ac_connected: Option<bool>,
    pub ac_charge_capable: Option<bool>,
    pub ac_transitions: Vec<bool>,
    pub adapter_info: Option<u32>,
    pub battery_location: Option<u16>,

    pub is_charging: Option<bool>,
    pub fully_charged: Option<bool>,
    pub full_discharge_notices: u32,

    pub current_capacity: Option<u16>,
    pub max_capacity: Option<u16>,
    pub design_capacity: Option<u16>,
    pub voltage: Option<u16>,
    pub amperage: Option<i16>,
    pub instant_amperage: Option<i16>,
    pub max_err: Option<u16>,
    pub cycle_count: Option<u16>,
    pub temperature: Option<u16>,

    pub average_time_to_empty: Option<u16>,
    pub instant_time_to_empty: Option<u16>,
    pub average_time_to_full: Option<u16>,
    pub time_remaining: Option<u16>,

    pub cell_voltages: Option<Vec<u16>>,
    pub charge_status: Option<Option<ChargeStatusReason>>,

    pub manufacturer_name: Option<String>,
    pub manufacturer_data: Option<Vec<u8>>,
    pub manufacture_date: Option<u16>,
    pub device_name: Option<String>,
    pub firmware_serial: Option<u16>,
    pub hardware_serial: Option<String>,
    pub pack_reserve: Option<u16>,
    pub pf_status: Option<u16>,
    pub operation_status: Option<u16>,

    pub identity_clears: u32,
    pub legacy_rebuilds: u32,
    pub observer_notifies: u32,
}

impl BatterySink for RecordingSink {
    fn set_battery_installed(&mut self, installed: bool) {
        self.battery_installed = Some(installed);
    }
    fn set_ac_connected(&mut self, connected: bool) {
        self.ac_connected = Some(connected);
    }
    fn set_ac_charge_capable(&mut self, capable: bool) {
        self.ac_charge_capable = Some(capable);
    }
    fn ac_transition(&mut self, connected: bool) {
        self.ac_transitions.push(connected);
    }
    fn set_adapter_info(&mut self, raw: u32) {
        self.adapter_info = Some(raw);
    }
    fn set_battery_location(&mut self, location: u16) {
        self.battery_location = Some(location);
    }
    fn set_is_charging(&mut self, charging: bool) {
        self.is_charging = Some(charging);
    }
    fn set_fully_charged(&mut self, fully_charged: bool) {
        self.fully_charged = Some(fully_charged);
    }
    fn notify_fully_discharged(&mut self) {
        self.full_discharge_notices += 1;
    }
    fn set_current_capacity(&mut self, mah: u16) {
        self.current_capacity = Some(mah);
    }
    fn set_max_capacity(&mut self, mah: u16) {
        self.max_capacity = Some(mah);
    }
    fn set_design_capacity(&mut self, mah: u16) {
        self.design_capacity = Some(mah);
    }
    fn set_voltage(&mut self, mv: u16) {
        self.voltage = Some(mv);
    }
    fn set_amperage(&mut self, ma: i16) {
        self.amperage = Some(ma);
    }
    fn set_instant_amperage(&mut self, ma: i16) {
        self.instant_amperage = Some(ma);
    }
    fn set_max_err(&mut self, pct: u16) {
        self.max_err = Some(pct);
    }
    fn set_cycle_count(&mut self, count: u16) {
        self.cycle_count = Some(count);
    }
    fn set_temperature(&mut self, raw: u16) {
        self.temperature = Some(raw);
    }
    fn set_average_time_to_empty(&mut self, minutes: u16) {
        self.average_time_to_empty = Some(minutes);
    }
    fn set_instant_time_to_empty(&mut self, minutes: u16) {
        self.instant_time_to_empty = Some(minutes);
    }
    fn set_average_time_to_full(&mut self, minutes: u16) {
        self.average_time_to_full = Some(minutes);
    }
    fn set_time_remaining(&mut self, minutes: u16) {
        self.time_remaining = Some(minutes);
    }
    fn set_cell_voltages(&mut self, cells: &[u16]) {
        self.cell_voltages = Some(cells.to_vec());
    }
    fn clear_cell_voltages(&mut self) {
        self.cell_voltages = None;
    }
    fn set_charge_status(&mut self, reason: Option<ChargeStatusReason>) {
        self.charge_status = Some(reason);
    }
    fn set_manufacturer_name(&mut self, name: &str) {
        self.manufacturer_name = Some(name.to_string());
    }
    fn set_manufacturer_data(&mut self, data: &[u8]) {
        self.manufacturer_data = Some(data.to_vec());
    }
    fn set_manufacture_date(&mut self, raw: u16) {
        self.manufacture_date = Some(raw);
    }
    fn set_device_name(&mut self, name: &str) {
        self.device_name = Some(name.to_string());
    }
    fn set_firmware_serial(&mut self, serial: u16) {
        self.firmware_serial = Some(serial);
    }
    fn set_hardware_serial(&mut self, serial: &str) {
        self.hardware_serial = Some(serial.to_string());
    }
    fn set_pack_reserve(&mut self, mah: u16) {
        self.pack_reserve = Some(mah);
    }
    fn set_pf_status(&mut self, word: u16) {
        self.pf_status = Some(word);
    }
    fn set_operation_status(&mut self, word: u16) {
        self.operation_status = Some(word);
    }
    fn clear_battery_identity(&mut self) {
        self.identity_clears += 1;
        self.manufacturer_name = None;
        self.manufacturer_data = None;
        self.manufacture_date = None;
        self.device_name = None;
        self.firmware_serial = None;
        self.hardware_serial = None;
        self.pf_status = None;
        self.operation_status = None;
    }
    fn rebuild_legacy_battery_info(&mut self, _snapshot: &BatterySnapshot) {
        self.legacy_rebuilds += 1;
    }
    fn notify_observers(&mut self) {
        self.observer_notifies += 1;
    }
}
