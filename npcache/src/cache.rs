//! Module de gestion du cache LRU en mémoire
//!
//! Ce module fournit un cache borné par le poids total de ses valeurs, avec
//! éviction stricte des entrées les moins récemment accédées. Contrairement à
//! un cache sur disque, la comptabilité se fait entièrement en mémoire et la
//! libération des ressources passe par le hook [`CacheValue::release`].

use std::collections::HashMap;

use tracing;

/// Valeur stockable dans un [`Cache`].
///
/// Le poids est exprimé en octets et doit rester constant pendant toute la
/// durée de vie de la valeur dans le cache : il est relevé une seule fois à
/// l'insertion pour la comptabilité.
pub trait CacheValue {
    /// Poids de la valeur en octets.
    fn weight(&self) -> u64;

    /// Appelé quand la valeur quitte le cache (éviction, remplacement ou
    /// purge). Permet de libérer des ressources associées.
    fn release(&mut self) {}
}

/// Entrée interne : valeur, poids relevé à l'insertion, récence d'accès.
struct Entry<V> {
    value: V,
    weight: u64,
    last_access: u64,
}

/// Cache LRU borné par le poids cumulé de ses valeurs.
///
/// L'ordre d'éviction est déterminé par la récence d'*accès* (`get` ou
/// `put`), jamais par l'ordre d'insertion. Après chaque opération le poids
/// cumulé reste inférieur ou égal à la capacité.
///
/// Note : ce type n'est pas synchronisé. Il est conçu pour vivre dans une
/// tâche unique qui sérialise tous les accès.
pub struct Cache<V: CacheValue> {
    /// Entrées indexées par clé
    entries: HashMap<String, Entry<V>>,
    /// Capacité en octets
    capacity: u64,
    /// Poids cumulé des entrées présentes
    total_weight: u64,
    /// Horloge logique, incrémentée à chaque accès
    tick: u64,
}

impl<V: CacheValue> Cache<V> {
    /// Crée un cache vide.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Poids cumulé maximal, en octets
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            total_weight: 0,
            tick: 0,
        }
    }

    /// Recherche une valeur et rafraîchit sa récence.
    ///
    /// Un miss retourne simplement `None` : ce n'est jamais une erreur.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_access = tick;
                Some(&entry.value)
            }
            None => None,
        }
    }

    /// Insère une valeur, en remplaçant l'éventuelle valeur existante sous
    /// la même clé.
    ///
    /// # Workflow
    ///
    /// 1. Relève le poids de la valeur
    /// 2. Si la clé existe déjà : libère l'ancienne valeur et sort son poids
    ///    de la comptabilité avant d'y faire entrer le nouveau
    /// 3. Rafraîchit la récence de la clé
    /// 4. Évince les entrées les moins récentes (sauf celle qui vient d'être
    ///    insérée) jusqu'à repasser sous la capacité
    ///
    /// Une valeur dont le poids dépasse à lui seul la capacité n'est jamais
    /// admise : elle est libérée immédiatement, et l'éventuelle ancienne
    /// valeur sous la même clé est retirée (la sémantique de remplacement
    /// reste entière).
    pub fn put(&mut self, key: &str, mut value: V) {
        let weight = value.weight();

        if weight > self.capacity {
            tracing::warn!(
                "Rejecting cache insert for {}: weight {} exceeds capacity {}",
                key,
                weight,
                self.capacity
            );
            if let Some(mut old) = self.entries.remove(key) {
                self.total_weight -= old.weight;
                old.value.release();
            }
            value.release();
            return;
        }

        self.tick += 1;
        let entry = Entry {
            value,
            weight,
            last_access: self.tick,
        };
        if let Some(mut old) = self.entries.insert(key.to_string(), entry) {
            self.total_weight -= old.weight;
            old.value.release();
        }
        self.total_weight += weight;

        self.enforce_capacity(key);
    }

    /// Vide le cache en libérant toutes les valeurs.
    pub fn evict_all(&mut self) {
        let count = self.entries.len();
        for (_, mut entry) in self.entries.drain() {
            entry.value.release();
        }
        self.total_weight = 0;
        if count > 0 {
            tracing::debug!("Cache cleared ({} entries released)", count);
        }
    }

    /// Nombre d'entrées présentes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Vrai si le cache ne contient aucune entrée.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Poids cumulé des entrées présentes, en octets.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Capacité configurée, en octets.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Évince les entrées les moins récemment accédées jusqu'à repasser sous
    /// la capacité. L'entrée `protect` (celle qui vient d'être insérée) n'est
    /// jamais évincée.
    fn enforce_capacity(&mut self, protect: &str) {
        let start_count = self.entries.len();
        let start_weight = self.total_weight;
        let mut removed = 0;

        while self.total_weight > self.capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(key, _)| key.as_str() != protect)
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                break;
            };
            if let Some(mut entry) = self.entries.remove(&victim) {
                self.total_weight -= entry.weight;
                entry.value.release();
                removed += 1;
                tracing::debug!("Evicted {} ({} bytes)", victim, entry.weight);
            }
        }

        if removed > 0 {
            tracing::info!(
                "LRU eviction: removed {} entries (weight {} -> {}, count {} -> {})",
                removed,
                start_weight,
                self.total_weight,
                start_count,
                start_count - removed
            );
        }
    }
}
