// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host USB access through `nusb`.

use std::io;

use futures_lite::future::block_on;
use nusb::transfer::{ControlIn, ControlType, Direction, EndpointType, Recipient, RequestBuffer};
use tracing::debug;

use druckwerk_core::error::{DruckwerkError, Result};

use super::{
    EndpointDirection, PrinterInterface, TransferType, UsbAltSetting, UsbBus, UsbConfiguration,
    UsbDeviceInfo, UsbEndpoint, UsbHandle, UsbInterface,
};

pub(super) struct NusbBus;

impl UsbBus for NusbBus {
    fn devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        let devices = nusb::list_devices()
            .map_err(|e| DruckwerkError::DeviceIo(format!("USB enumeration: {e}")))?;

        let mut found = Vec::new();
        for info in devices {
            // Descriptors need an open handle; devices we may not open are skipped.
            let device = match info.open() {
                Ok(device) => device,
                Err(e) => {
                    debug!(
                        bus = info.bus_number(),
                        address = info.device_address(),
                        error = %e,
                        "skipping USB device"
                    );
                    continue;
                }
            };

            let configurations = device
                .configurations()
                .map(|config| UsbConfiguration {
                    value: config.configuration_value(),
                    interfaces: config
                        .interfaces()
                        .map(|group| UsbInterface {
                            number: group.interface_number(),
                            alt_settings: group
                                .alt_settings()
                                .map(|alt| UsbAltSetting {
                                    alt_setting: alt.alternate_setting(),
                                    class: alt.class(),
                                    subclass: alt.subclass(),
                                    protocol: alt.protocol(),
                                    endpoints: alt
                                        .endpoints()
                                        .map(|ep| UsbEndpoint {
                                            address: ep.address(),
                                            direction: match ep.direction() {
                                                Direction::In => EndpointDirection::In,
                                                Direction::Out => EndpointDirection::Out,
                                            },
                                            transfer: match ep.transfer_type() {
                                                EndpointType::Control => TransferType::Control,
                                                EndpointType::Isochronous => {
                                                    TransferType::Isochronous
                                                }
                                                EndpointType::Bulk => TransferType::Bulk,
                                                EndpointType::Interrupt => TransferType::Interrupt,
                                            },
                                        })
                                        .collect(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect();

            found.push(UsbDeviceInfo {
                bus: info.bus_number(),
                address: info.device_address(),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                manufacturer: info.manufacturer_string().map(str::to_string),
                product: info.product_string().map(str::to_string),
                serial: info.serial_number().map(|s| s.as_bytes().to_vec()),
                configurations,
            });
        }
        Ok(found)
    }

    fn open(&self, dev: &UsbDeviceInfo, iface: &PrinterInterface) -> Result<Box<dyn UsbHandle>> {
        let open_err = |reason: String| DruckwerkError::DeviceOpen {
            uri: format!("usb:{:03}/{:03}", dev.bus, dev.address),
            reason,
        };

        let info = nusb::list_devices()
            .map_err(|e| open_err(format!("USB enumeration: {e}")))?
            .find(|d| d.bus_number() == dev.bus && d.device_address() == dev.address)
            .ok_or_else(|| open_err("device disconnected".into()))?;
        let device = info.open().map_err(|e| open_err(e.to_string()))?;

        let active = device.active_configuration().map(|c| c.configuration_value());
        if active.ok() != Some(iface.configuration) {
            device
                .set_configuration(iface.configuration)
                .map_err(|e| open_err(format!("set configuration: {e}")))?;
        }

        let interface = device
            .detach_and_claim_interface(iface.interface)
            .map_err(|e| open_err(format!("claim interface {}: {e}", iface.interface)))?;
        if iface.alt_setting != 0 {
            interface
                .set_alt_setting(iface.alt_setting)
                .map_err(|e| open_err(format!("alt setting {}: {e}", iface.alt_setting)))?;
        }

        Ok(Box::new(NusbHandle {
            interface: Some(interface),
            write_endpoint: iface.write_endpoint,
            read_endpoint: iface.read_endpoint,
        }))
    }
}

struct NusbHandle {
    interface: Option<nusb::Interface>,
    write_endpoint: u8,
    read_endpoint: Option<u8>,
}

impl NusbHandle {
    fn interface(&self) -> io::Result<&nusb::Interface> {
        self.interface
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "USB interface released"))
    }
}

impl UsbHandle for NusbHandle {
    fn bulk_out(&mut self, data: &[u8]) -> io::Result<usize> {
        let completion = block_on(self.interface()?.bulk_out(self.write_endpoint, data.to_vec()));
        completion.status.map_err(io::Error::other)?;
        Ok(completion.data.actual_length())
    }

    fn bulk_in(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let endpoint = self
            .read_endpoint
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "unidirectional interface"))?;
        let completion = block_on(
            self.interface()?
                .bulk_in(endpoint, RequestBuffer::new(buf.len())),
        );
        completion.status.map_err(io::Error::other)?;
        let count = completion.data.len().min(buf.len());
        buf[..count].copy_from_slice(&completion.data[..count]);
        Ok(count)
    }

    fn control_in(
        &mut self,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
    ) -> io::Result<usize> {
        let length = u16::try_from(buf.len()).unwrap_or(u16::MAX);
        let completion = block_on(self.interface()?.control_in(ControlIn {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request,
            value,
            index,
            length,
        }));
        completion.status.map_err(io::Error::other)?;
        let count = completion.data.len().min(buf.len());
        buf[..count].copy_from_slice(&completion.data[..count]);
        Ok(count)
    }

    fn release(&mut self) {
        self.interface.take();
    }
}
