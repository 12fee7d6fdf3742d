//! Service-Tests fuer den Broadcast-Bus

mod bus_tests;
