//! Passwort-Hashing mit Argon2id
//!
//! Argon2id ist der empfohlene Algorithmus gemaess OWASP-Richtlinien.
//! Die Kostenparameter kommen aus der Pool-Konfiguration, damit
//! Deployments sie an ihre Hardware anpassen koennen.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};

use crate::error::{PoolError, PoolResult};

/// Argon2id-Kostenparameter
///
/// Standardwerte gemaess OWASP-Empfehlungen (Stand 2024):
/// Speicher 64 MiB, 3 Iterationen, Parallelismus 1.
#[derive(Debug, Clone, Copy)]
pub struct HashKosten {
    /// Speicher in KiB (m_cost)
    pub speicher_kib: u32,
    /// Iterationen (t_cost)
    pub iterationen: u32,
    /// Parallele Lanes (p_cost)
    pub parallelitaet: u32,
}

impl Default for HashKosten {
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024,
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

fn argon2_instanz(kosten: &HashKosten) -> PoolResult<Argon2<'static>> {
    let params = Params::new(
        kosten.speicher_kib,
        kosten.iterationen,
        kosten.parallelitaet,
        None, // output_len: Standard (32 Bytes)
    )
    .map_err(|e| PoolError::Hashing(format!("Ungueltige Argon2-Parameter: {e}")))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
///
/// Gibt den PHC-String zurueck (inkl. Algorithmus, Parameter und Salt).
pub fn passwort_hashen(passwort: &str, kosten: &HashKosten) -> PoolResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2_instanz(kosten)?;

    argon2
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PoolError::Hashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
///
/// Ein legitimer Nicht-Treffer ist `FalschesPasswort` – unterscheidbar
/// von Infrastruktur-Fehlern wie einem unlesbaren Hash.
pub fn passwort_verifizieren(passwort: &str, hash: &str, kosten: &HashKosten) -> PoolResult<()> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PoolError::Hashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match argon2_instanz(kosten)?.verify_password(passwort.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(PoolError::FalschesPasswort),
        Err(e) => Err(PoolError::Hashing(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Kleine Kosten, damit die Tests schnell bleiben
    const TEST_KOSTEN: HashKosten = HashKosten {
        speicher_kib: 1024,
        iterationen: 1,
        parallelitaet: 1,
    };

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let passwort = "sicheres_passwort_123!";
        let hash = passwort_hashen(passwort, &TEST_KOSTEN).expect("Hashing fehlgeschlagen");

        assert!(!hash.is_empty());
        assert!(
            hash.starts_with("$argon2id$"),
            "Hash muss mit $argon2id$ beginnen"
        );

        passwort_verifizieren(passwort, &hash, &TEST_KOSTEN)
            .expect("Passwort muss korrekt verifiziert werden");
    }

    #[test]
    fn falsches_passwort_wird_abgelehnt() {
        let hash = passwort_hashen("richtiges_passwort", &TEST_KOSTEN).unwrap();

        let ergebnis = passwort_verifizieren("falsches_passwort", &hash, &TEST_KOSTEN);
        assert!(
            matches!(ergebnis, Err(PoolError::FalschesPasswort)),
            "Nicht-Treffer muss als FalschesPasswort auftauchen"
        );
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let passwort = "gleiches_passwort";
        let hash1 = passwort_hashen(passwort, &TEST_KOSTEN).unwrap();
        let hash2 = passwort_hashen(passwort, &TEST_KOSTEN).unwrap();

        assert_ne!(
            hash1, hash2,
            "Gleiche Passwoerter muessen verschiedene Hashes erzeugen (Salt)"
        );
    }

    #[test]
    fn ungueltiges_hash_format_gibt_hashing_fehler() {
        let ergebnis = passwort_verifizieren("passwort", "kein_gueltiger_hash", &TEST_KOSTEN);
        assert!(
            matches!(ergebnis, Err(PoolError::Hashing(_))),
            "Unlesbarer Hash ist ein Infrastruktur-Fehler, kein Nicht-Treffer"
        );
    }

    #[test]
    fn ungueltige_kosten_werden_abgelehnt() {
        let kosten = HashKosten {
            speicher_kib: 0,
            iterationen: 0,
            parallelitaet: 0,
        };
        assert!(matches!(
            passwort_hashen("passwort", &kosten),
            Err(PoolError::Hashing(_))
        ));
    }
}
