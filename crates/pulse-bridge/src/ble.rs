// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BLE notification source (requires the `ble` feature)
//!
//! Connects to a single sensor by address, subscribes to one characteristic
//! and yields its notification payloads. The link is not re-established when
//! it drops.

use crate::source::{NotificationSource, SourceError};
use async_trait::async_trait;
use btleplug::api::{
    bleuuid::uuid_from_u16, BDAddr, Central, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification,
};
use btleplug::platform::{Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const SCAN_POLL: Duration = Duration::from_millis(500);

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

fn link_error(e: btleplug::Error) -> SourceError {
    SourceError::Link(e.to_string())
}

/// Subscribed BLE characteristic
pub struct BleSource {
    peripheral: Peripheral,
    characteristic: uuid::Uuid,
    notifications: NotificationStream,
}

impl BleSource {
    /// Scan for `address`, connect and subscribe to `characteristic`.
    pub async fn connect(
        address: &str,
        characteristic: u16,
        scan_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let wanted: BDAddr = address
            .parse()
            .map_err(|_| SourceError::InvalidAddress(address.to_string()))?;

        let manager = Manager::new().await.map_err(link_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(link_error)?
            .into_iter()
            .next()
            .ok_or(SourceError::NoAdapter)?;

        tracing::info!("Scanning for {}", wanted);
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(link_error)?;

        let deadline = Instant::now() + scan_timeout;
        let peripheral = loop {
            let found = adapter
                .peripherals()
                .await
                .map_err(link_error)?
                .into_iter()
                .find(|p| p.address() == wanted);
            if let Some(p) = found {
                break p;
            }
            if Instant::now() >= deadline {
                if let Err(e) = adapter.stop_scan().await {
                    tracing::warn!("Failed to stop BLE scan: {}", e);
                }
                return Err(SourceError::DeviceNotFound(address.to_string()));
            }
            sleep(SCAN_POLL).await;
        };
        if let Err(e) = adapter.stop_scan().await {
            tracing::warn!("Failed to stop BLE scan: {}", e);
        }

        peripheral.connect().await.map_err(link_error)?;
        peripheral.discover_services().await.map_err(link_error)?;
        tracing::info!("Connected to {}", wanted);

        let uuid = uuid_from_u16(characteristic);
        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(SourceError::CharacteristicNotFound(characteristic))?;

        peripheral.subscribe(&target).await.map_err(link_error)?;
        let notifications = peripheral.notifications().await.map_err(link_error)?;

        Ok(Self {
            peripheral,
            characteristic: uuid,
            notifications,
        })
    }

    /// Drop the link to the sensor.
    pub async fn disconnect(self) {
        if let Err(e) = self.peripheral.disconnect().await {
            tracing::warn!("BLE disconnect failed: {}", e);
        }
    }
}

#[async_trait]
impl NotificationSource for BleSource {
    async fn next_notification(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        while let Some(notification) = self.notifications.next().await {
            if notification.uuid == self.characteristic {
                return Ok(Some(notification.value));
            }
        }
        Err(SourceError::Disconnected)
    }
}
